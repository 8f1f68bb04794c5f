//! Remote metadata probe.
//!
//! A header-only request is issued against the URL and each response header
//! field is fed through [`HeaderCapture`], which keeps the handful of values the
//! planner and filename resolver need. Captured values are length-bounded.

use std::time::UNIX_EPOCH;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::MAX_HEADER_VALUE_LEN;
use super::error::DownloadError;
use super::transport::{HeadResponse, Transport};

/// Immutable snapshot of one header-only probe.
///
/// Every field may be absent; absence means "undetermined" and each consumer
/// has a fallback for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteMetadata {
    /// Resource size in bytes, if reported.
    pub content_length: Option<u64>,
    /// Lowercased MIME type, or empty when unknown.
    pub content_type: String,
    /// Raw `Content-Disposition` value, if present.
    pub content_disposition: Option<String>,
    /// Final URL when the server redirected.
    pub redirect_location: Option<String>,
    /// Server modification time as Unix seconds; only positive values are kept.
    pub remote_mod_time: Option<i64>,
}

impl RemoteMetadata {
    /// Metadata with every field undetermined.
    #[must_use]
    pub fn undetermined() -> Self {
        Self::default()
    }
}

/// Collects the relevant fields from response header lines.
#[derive(Debug, Default)]
pub struct HeaderCapture {
    content_length: Option<u64>,
    content_type: Option<String>,
    content_disposition: Option<String>,
    location: Option<String>,
    last_modified: Option<i64>,
}

impl HeaderCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one header field.
    ///
    /// Values longer than [`MAX_HEADER_VALUE_LEN`] are dropped rather than
    /// truncated, so a cut-off filename can never be used.
    pub fn record(&mut self, name: &str, value: &[u8]) {
        if value.len() > MAX_HEADER_VALUE_LEN {
            debug!(header = name, len = value.len(), "dropping oversized header value");
            return;
        }
        let value = String::from_utf8_lossy(value);
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse().ok();
        } else if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.to_ascii_lowercase());
        } else if name.eq_ignore_ascii_case("content-disposition") {
            self.content_disposition = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("location") {
            self.location = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("last-modified") {
            self.last_modified = parse_http_timestamp(value);
        }
    }

    /// Builds the metadata snapshot.
    ///
    /// `requested` is the probed URL and `final_url` the one that answered; a
    /// difference between them counts as a redirect.
    #[must_use]
    pub fn finish(self, requested: &Url, final_url: &Url) -> RemoteMetadata {
        let redirect_location = self.location.or_else(|| {
            (final_url != requested).then(|| final_url.to_string())
        });
        RemoteMetadata {
            content_length: self.content_length,
            content_type: self.content_type.unwrap_or_default(),
            content_disposition: self.content_disposition,
            redirect_location,
            remote_mod_time: self.last_modified,
        }
    }
}

/// Parses an HTTP-date into Unix seconds. Dates at or before the epoch yield `None`.
#[must_use]
pub fn parse_http_timestamp(value: &str) -> Option<i64> {
    let time = httpdate::parse_http_date(value.trim()).ok()?;
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok().filter(|secs| *secs > 0)
}

fn capture_head(requested: &Url, head: &HeadResponse) -> RemoteMetadata {
    let mut capture = HeaderCapture::new();
    for (name, value) in &head.headers {
        capture.record(name.as_str(), value.as_bytes());
    }
    capture.finish(requested, &head.final_url)
}

/// Probes `url` for remote metadata.
///
/// Network failures and error statuses are not fatal: the probe logs a
/// warning and returns [`RemoteMetadata::undetermined`].
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] for a malformed URL and
/// [`DownloadError::UnsupportedScheme`] when the transport cannot handle it.
#[instrument(skip(transport), fields(url = %url))]
pub async fn probe(transport: &dyn Transport, url: &str) -> Result<RemoteMetadata, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

    match transport.head(&parsed).await {
        Ok(head) => {
            let metadata = capture_head(&parsed, &head);
            debug!(?metadata, "probe complete");
            Ok(metadata)
        }
        Err(e) if e.is_bad_input() => Err(e),
        Err(e) => {
            warn!(error = %e, "couldn't probe remote metadata; continuing without it");
            Ok(RemoteMetadata::undetermined())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_capture_reads_relevant_headers_case_insensitively() {
        let mut capture = HeaderCapture::new();
        capture.record("CONTENT-LENGTH", b"2048");
        capture.record("Content-Type", b"Video/MP4");
        capture.record("content-disposition", b"attachment; filename=\"clip.mp4\"");
        capture.record("Last-Modified", b"Sun, 06 Nov 1994 08:49:37 GMT");
        capture.record("X-Ignored", b"yes");

        let requested = url("https://example.com/clip");
        let metadata = capture.finish(&requested, &requested);

        assert_eq!(metadata.content_length, Some(2048));
        assert_eq!(metadata.content_type, "video/mp4");
        assert_eq!(
            metadata.content_disposition.as_deref(),
            Some("attachment; filename=\"clip.mp4\"")
        );
        assert_eq!(metadata.remote_mod_time, Some(784_111_777));
        assert!(metadata.redirect_location.is_none());
    }

    #[test]
    fn test_capture_detects_redirect_from_final_url() {
        let capture = HeaderCapture::new();
        let metadata = capture.finish(
            &url("https://example.com/latest"),
            &url("https://cdn.example.com/files/v2.zip"),
        );
        assert_eq!(
            metadata.redirect_location.as_deref(),
            Some("https://cdn.example.com/files/v2.zip")
        );
    }

    #[test]
    fn test_capture_drops_oversized_values() {
        let mut capture = HeaderCapture::new();
        let huge = format!("attachment; filename=\"{}.pdf\"", "a".repeat(MAX_HEADER_VALUE_LEN));
        capture.record("Content-Disposition", huge.as_bytes());
        let requested = url("https://example.com/x");
        assert!(capture.finish(&requested, &requested).content_disposition.is_none());
    }

    #[test]
    fn test_capture_ignores_unparseable_length_and_date() {
        let mut capture = HeaderCapture::new();
        capture.record("Content-Length", b"lots");
        capture.record("Last-Modified", b"yesterday");
        let requested = url("https://example.com/x");
        let metadata = capture.finish(&requested, &requested);
        assert!(metadata.content_length.is_none());
        assert!(metadata.remote_mod_time.is_none());
    }

    #[test]
    fn test_parse_http_timestamp_rejects_epoch() {
        assert_eq!(parse_http_timestamp("Thu, 01 Jan 1970 00:00:00 GMT"), None);
        assert_eq!(
            parse_http_timestamp("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(784_111_777)
        );
    }
}
