//! Transfer layer seam and its HTTP/HTTPS implementation.
//!
//! The engine only needs three capabilities from a transfer layer: a
//! header-only request, a streaming GET with an optional resume offset, and
//! the final URL after redirects. [`Transport`] captures those;
//! [`SchemeTransport`] routes each URL to the HTTP or the FTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT_ENCODING, HeaderMap, HeaderValue, LAST_MODIFIED, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, TCP_KEEPALIVE_SECS};
use super::error::DownloadError;
use super::ftp::FtpTransport;
use super::metadata::parse_http_timestamp;
use super::resume::ResumeOffset;
use crate::user_agent;

/// Response of a header-only request.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    /// URL that finally answered, after redirects.
    pub final_url: Url,
    /// Response header fields.
    pub headers: HeaderMap,
}

/// Body chunks in arrival order.
pub type BodyStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// A streaming body response.
pub struct FetchResponse {
    /// URL that finally answered, after redirects.
    pub final_url: Url,
    /// True when the body continues the local file from the requested offset.
    pub continues_from_offset: bool,
    /// Bytes this response will deliver, when reported.
    pub body_length: Option<u64>,
    /// Server modification time as Unix seconds, when reported.
    pub last_modified: Option<i64>,
    /// Body chunks in arrival order.
    pub body: BodyStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("final_url", &self.final_url.as_str())
            .field("continues_from_offset", &self.continues_from_offset)
            .field("body_length", &self.body_length)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// Capability set the download engine needs from a transfer layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a no-body request, following redirects.
    async fn head(&self, url: &Url) -> Result<HeadResponse, DownloadError>;

    /// Starts a streaming transfer, optionally resuming from `resume`.
    ///
    /// `None` requests the whole resource. [`ResumeOffset::ServerDetermined`]
    /// is resolved to a byte offset before it reaches a transport; both
    /// implementations treat it as a whole-resource request.
    async fn fetch(
        &self,
        url: &Url,
        resume: Option<ResumeOffset>,
    ) -> Result<FetchResponse, DownloadError>;
}

/// Runtime settings shared by the HTTP and FTP transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            user_agent: user_agent::default_download_user_agent(),
        }
    }
}

/// HTTP/HTTPS transport backed by a pooled `reqwest` client.
///
/// No overall request timeout is set: large transfers may run as long as the
/// connection stays alive. Bodies are requested with `Accept-Encoding:
/// identity` so byte counts on disk match `Content-Length` and range offsets.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport from `config`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error if the TLS backend or system
    /// configuration cannot be initialized.
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE_SECS))
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, DownloadError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url.as_str())
            } else {
                DownloadError::network(url.as_str(), e)
            }
        })
    }
}

fn ensure_http_scheme(url: &Url) -> Result<(), DownloadError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(DownloadError::unsupported_scheme(url.as_str(), other)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn head(&self, url: &Url) -> Result<HeadResponse, DownloadError> {
        ensure_http_scheme(url)?;
        let response = self.send(self.client.head(url.clone()), url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }
        debug!(status = status.as_u16(), final_url = %response.url(), "probe answered");
        Ok(HeadResponse {
            final_url: response.url().clone(),
            headers: response.headers().clone(),
        })
    }

    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn fetch(
        &self,
        url: &Url,
        resume: Option<ResumeOffset>,
    ) -> Result<FetchResponse, DownloadError> {
        ensure_http_scheme(url)?;

        let mut request = self.client.get(url.clone());
        let requested_offset = match resume {
            Some(ResumeOffset::Bytes(offset)) if offset > 0 => {
                request = request.header(RANGE, format!("bytes={offset}-"));
                true
            }
            // HTTP has no server-chosen append; fall through to a full fetch.
            _ => false,
        };

        let response = self.send(request, url).await?;
        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(DownloadError::range_not_satisfiable(url.as_str()));
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }

        let continues_from_offset = requested_offset && status == StatusCode::PARTIAL_CONTENT;
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_timestamp);
        let final_url = response.url().clone();
        let body_length = response.content_length();
        debug!(
            status = status.as_u16(),
            continues_from_offset,
            body_length = ?body_length,
            "transfer started"
        );

        let error_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(error_url.clone(), e)))
            .boxed();

        Ok(FetchResponse {
            final_url,
            continues_from_offset,
            body_length,
            last_modified,
            body,
        })
    }
}

/// Routes `http`/`https` URLs to [`HttpTransport`] and `ftp` URLs to
/// [`FtpTransport`].
#[derive(Debug, Clone)]
pub struct SchemeTransport {
    http: HttpTransport,
    ftp: FtpTransport,
}

impl SchemeTransport {
    /// Builds both transports from `config`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error from [`HttpTransport::new`].
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: HttpTransport::new(config)?,
            ftp: FtpTransport::new(config),
        })
    }

    fn route(&self, url: &Url) -> Result<&dyn Transport, DownloadError> {
        match url.scheme() {
            "http" | "https" => Ok(&self.http),
            "ftp" => Ok(&self.ftp),
            other => Err(DownloadError::unsupported_scheme(url.as_str(), other)),
        }
    }
}

#[async_trait]
impl Transport for SchemeTransport {
    async fn head(&self, url: &Url) -> Result<HeadResponse, DownloadError> {
        self.route(url)?.head(url).await
    }

    async fn fetch(
        &self,
        url: &Url,
        resume: Option<ResumeOffset>,
    ) -> Result<FetchResponse, DownloadError> {
        self.route(url)?.fetch(url, resume).await
    }
}
