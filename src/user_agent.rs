//! User-Agent string sent with every probe and transfer request.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/fetcher";

/// Default User-Agent for download requests (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("fetcher/{version} (+{PROJECT_UA_URL})")
}
