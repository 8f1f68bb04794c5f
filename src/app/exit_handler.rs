//! Exit code logic for the fetcher process.
//!
//! Single responsibility: map batch counts to the process exit outcome.

use fetcher_core::BatchSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from succeeded and failed job counts.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Exit outcome for a finished batch; an interrupt overrides the counts.
pub(crate) fn exit_outcome_for_batch(summary: &BatchSummary) -> ProcessExit {
    if summary.was_interrupted() {
        ProcessExit::Interrupted
    } else {
        determine_exit_outcome(summary.succeeded(), summary.failed())
    }
}

#[cfg(test)]
mod tests {
    use super::{determine_exit_outcome, exit_outcome_for_batch};
    use crate::ProcessExit;
    use fetcher_core::BatchSummary;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_outcome_for_empty_batch_is_success() {
        assert_eq!(
            exit_outcome_for_batch(&BatchSummary::default()),
            ProcessExit::Success
        );
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero_on_failure() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Partial.code(), 1);
        assert_eq!(ProcessExit::Failure.code(), 2);
        assert_eq!(ProcessExit::Interrupted.code(), 130);
    }
}
