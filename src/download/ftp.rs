//! Minimal passive-mode FTP transport.
//!
//! Each request opens its own control connection, logs in (anonymous unless
//! the URL carries credentials), switches to binary mode and then issues
//! `SIZE`/`MDTM` for metadata or `PASV`, `REST` and `RETR` for a transfer.
//! Metadata is returned as HTTP-style header fields so the probe treats both
//! protocols alike.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue, LAST_MODIFIED};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;
use super::resume::ResumeOffset;
use super::transport::{FetchResponse, HeadResponse, Transport, TransportConfig};

const DEFAULT_PORT: u16 = 21;
const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// One server reply: code and the text of its last line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }
}

/// FTP transport speaking passive mode over `tokio` sockets.
#[derive(Debug, Clone)]
pub struct FtpTransport {
    connect_timeout: Duration,
}

impl FtpTransport {
    /// Creates a transport using the connect timeout from `config`.
    #[must_use]
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
        }
    }

    async fn open(&self, url: &Url) -> Result<Session, DownloadError> {
        if url.scheme() != "ftp" {
            return Err(DownloadError::unsupported_scheme(url.as_str(), url.scheme()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| DownloadError::invalid_url(url.as_str()))?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let stream = connect(url, (host, port), self.connect_timeout).await?;
        let mut session = Session::new(url, stream)?;
        session.expect_reply(&[220]).await?;

        let user = match url.username() {
            "" => ANONYMOUS_USER.to_string(),
            name => decode(name),
        };
        let reply = session.command(&format!("USER {user}")).await?;
        if reply.code == 331 {
            let password = url.password().map_or_else(|| ANONYMOUS_PASSWORD.to_string(), decode);
            session.command_expect(&format!("PASS {password}"), &[230, 202]).await?;
        } else if !matches!(reply.code, 230 | 202) {
            return Err(session.refused(&reply));
        }
        session.command_expect("TYPE I", &[200]).await?;
        Ok(session)
    }
}

#[async_trait]
impl Transport for FtpTransport {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn head(&self, url: &Url) -> Result<HeadResponse, DownloadError> {
        let mut session = self.open(url).await?;
        let path = remote_path(url);

        let mut headers = HeaderMap::new();
        if let Some(size) = session.size(&path).await? {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        }
        if let Some(time) = session.modification_time(&path).await?
            && let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(time))
        {
            headers.insert(LAST_MODIFIED, value);
        }
        session.quit().await;

        debug!(?headers, "probe answered");
        Ok(HeadResponse {
            final_url: url.clone(),
            headers,
        })
    }

    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn fetch(
        &self,
        url: &Url,
        resume: Option<ResumeOffset>,
    ) -> Result<FetchResponse, DownloadError> {
        let mut session = self.open(url).await?;
        let path = remote_path(url);

        let size = session.size(&path).await?;
        let last_modified = session
            .modification_time(&path)
            .await?
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .and_then(|since| i64::try_from(since.as_secs()).ok())
            .filter(|secs| *secs > 0);

        if let (Some(ResumeOffset::Bytes(requested)), Some(size)) = (resume, size)
            && requested > size
        {
            session.quit().await;
            return Err(DownloadError::range_not_satisfiable(url.as_str()));
        }

        let data_addr = session.passive().await?;
        let data = connect(url, data_addr, self.connect_timeout).await?;

        // A refused REST falls back to the whole file.
        let offset = match resume {
            Some(ResumeOffset::Bytes(offset)) if offset > 0 => {
                let reply = session.command(&format!("REST {offset}")).await?;
                (reply.code == 350).then_some(offset)
            }
            _ => None,
        };

        session
            .command_expect(&format!("RETR {path}"), &[125, 150])
            .await?;

        let continues_from_offset = offset.is_some();
        let body_length = size.map(|size| size.saturating_sub(offset.unwrap_or(0)));
        debug!(continues_from_offset, body_length = ?body_length, "transfer started");

        let error_url = url.to_string();
        let chunks = ReaderStream::new(data)
            .map(move |chunk| chunk.map_err(|e| DownloadError::connection(error_url.clone(), e)));
        // The completion reply arrives on the control connection after the data
        // connection closes; only a failure is passed on as a chunk.
        let completion = stream::once(async move { session.finish_transfer().await })
            .filter_map(|result| async move { result.err().map(Err::<Bytes, _>) });

        Ok(FetchResponse {
            final_url: url.clone(),
            continues_from_offset,
            body_length,
            last_modified,
            body: chunks.chain(completion).boxed(),
        })
    }
}

struct Session {
    url: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl Session {
    fn new(url: &Url, stream: TcpStream) -> Result<Self, DownloadError> {
        let peer = stream
            .peer_addr()
            .map_err(|e| DownloadError::connection(url.as_str(), e))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            url: url.to_string(),
            reader: BufReader::new(reader),
            writer,
            peer,
        })
    }

    fn io_error(&self, source: std::io::Error) -> DownloadError {
        DownloadError::connection(self.url.as_str(), source)
    }

    fn refused(&self, reply: &Reply) -> DownloadError {
        DownloadError::ftp_status(self.url.as_str(), reply.code, reply.text.as_str())
    }

    /// Reads one reply, following multi-line `NNN-` continuations.
    async fn read_reply(&mut self) -> Result<Reply, DownloadError> {
        let first = self.read_line().await?;
        let Some((code, separator, text)) = split_reply_line(&first) else {
            return Err(DownloadError::ftp_status(self.url.as_str(), 0, first));
        };
        if separator != '-' {
            return Ok(Reply { code, text });
        }

        loop {
            let next = self.read_line().await?;
            if let Some((end, ' ', text)) = split_reply_line(&next)
                && end == code
            {
                return Ok(Reply { code, text });
            }
        }
    }

    async fn read_line(&mut self) -> Result<String, DownloadError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| self.io_error(e))?;
        if read == 0 {
            return Err(self.io_error(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn command(&mut self, command: &str) -> Result<Reply, DownloadError> {
        let logged = if command.starts_with("PASS ") {
            "PASS ****"
        } else {
            command
        };
        debug!(command = logged, "ftp command");
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        self.read_reply().await
    }

    async fn command_expect(&mut self, command: &str, codes: &[u16]) -> Result<Reply, DownloadError> {
        let reply = self.command(command).await?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(self.refused(&reply))
        }
    }

    async fn expect_reply(&mut self, codes: &[u16]) -> Result<Reply, DownloadError> {
        let reply = self.read_reply().await?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(self.refused(&reply))
        }
    }

    /// `SIZE`; servers without the extension report nothing.
    async fn size(&mut self, path: &str) -> Result<Option<u64>, DownloadError> {
        let reply = self.command(&format!("SIZE {path}")).await?;
        Ok((reply.code == 213)
            .then(|| reply.text.trim().parse().ok())
            .flatten())
    }

    /// `MDTM`; servers without the extension report nothing.
    async fn modification_time(&mut self, path: &str) -> Result<Option<SystemTime>, DownloadError> {
        let reply = self.command(&format!("MDTM {path}")).await?;
        Ok((reply.code == 213)
            .then(|| parse_mdtm(&reply.text))
            .flatten())
    }

    /// Enters passive mode and returns the data address.
    ///
    /// The advertised host is replaced by the control connection's peer, so a
    /// server behind NAT that reports a private address still works.
    async fn passive(&mut self) -> Result<SocketAddr, DownloadError> {
        let reply = self.command_expect("PASV", &[227]).await?;
        let port = parse_pasv_port(&reply.text).ok_or_else(|| self.refused(&reply))?;
        Ok(SocketAddr::new(self.peer.ip(), port))
    }

    async fn finish_transfer(mut self) -> Result<(), DownloadError> {
        let reply = self.read_reply().await?;
        if !reply.is_positive() {
            return Err(self.refused(&reply));
        }
        self.quit().await;
        Ok(())
    }

    async fn quit(&mut self) {
        if let Err(e) = self.command("QUIT").await {
            debug!(error = %e, "ftp QUIT failed");
        }
    }
}

async fn connect<A>(url: &Url, addr: A, timeout: Duration) -> Result<TcpStream, DownloadError>
where
    A: tokio::net::ToSocketAddrs,
{
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(DownloadError::connection(url.as_str(), e)),
        Err(_) => Err(DownloadError::timeout(url.as_str())),
    }
}

fn decode(component: &str) -> String {
    urlencoding::decode(component).map_or_else(|_| component.to_string(), |s| s.into_owned())
}

fn remote_path(url: &Url) -> String {
    decode(url.path())
}

/// Splits `NNN<sep>text` into code, separator and text.
fn split_reply_line(line: &str) -> Option<(u16, char, String)> {
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = code.parse().ok()?;
    let mut rest = line[3..].chars();
    let separator = rest.next().unwrap_or(' ');
    if separator != ' ' && separator != '-' {
        return None;
    }
    Some((code, separator, rest.as_str().to_string()))
}

/// Extracts the port from `Entering Passive Mode (h1,h2,h3,h4,p1,p2)`.
fn parse_pasv_port(text: &str) -> Option<u16> {
    let start = text.find('(')?;
    let end = text[start..].find(')')? + start;
    let numbers: Vec<u16> = text[start + 1..end]
        .split(',')
        .map(|n| n.trim().parse().ok())
        .collect::<Option<_>>()?;
    match numbers.as_slice() {
        [_, _, _, _, high, low] if *high <= 255 && *low <= 255 => Some(high * 256 + low),
        _ => None,
    }
}

/// Parses an `MDTM` timestamp (`YYYYMMDDHHMMSS[.sss]`, UTC).
fn parse_mdtm(text: &str) -> Option<SystemTime> {
    let digits = text.trim();
    let digits = digits.split_once('.').map_or(digits, |(whole, _)| whole);
    if digits.len() != 14 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| digits[range].parse::<i64>().ok();
    let (year, month, day) = (field(0..4)?, field(4..6)?, field(6..8)?);
    let (hour, minute, second) = (field(8..10)?, field(10..12)?, field(12..14)?);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60
    {
        return None;
    }

    let secs = days_from_civil(year, month, day) * 86_400 + hour * 3_600 + minute * 60 + second;
    let secs = u64::try_from(secs).ok()?;
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let shifted_month = (month + 9) % 12;
    let day_of_year = (153 * shifted_month + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}
