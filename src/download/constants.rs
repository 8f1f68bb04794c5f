//! Constants for the download module (timeouts, header bounds, progress layout).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// TCP keepalive interval; transfers themselves have no overall timeout.
pub const TCP_KEEPALIVE_SECS: u64 = 60;

/// Longest header value captured during a probe.
pub const MAX_HEADER_VALUE_LEN: usize = 8 * 1024;

/// Extension used when neither content type nor URL reveal one.
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Longest extension accepted from a URL suffix, dot included.
pub const MAX_URL_EXTENSION_LEN: usize = 12;

/// Stem used when no filename can be derived at all (`file1`, `file2`, ...).
pub const SYNTHETIC_FILENAME_STEM: &str = "file";

/// Width of the progress meter between the brackets.
pub const PROGRESS_BAR_WIDTH: usize = 30;
