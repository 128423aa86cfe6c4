//! Multi-source fetch-and-fallback client.
//!
//! Fetches a hosts-format document from an ordered list of remote
//! sources. Each source gets a bounded retry budget with exponential
//! backoff; a source that times out, returns a non-2xx status, answers
//! with HTML, or parses to zero records counts as failed and the next
//! source is tried. Only exhausting every source is an error.
//!
//! The transfer is a deliberately minimal HTTP/1.1 GET with
//! `Connection: close` over a raw TCP (or TLS) stream. This tool is not
//! an HTTP client library; it needs exactly one request shape.

use std::time::Duration;

use bytes::BytesMut;
use boring::ssl::{SslConnector, SslMethod};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use super::parser::{looks_like_html, parse_hosts_text, DomainFilter};
use super::retry::FetchRetry;
use super::source::{FetchMode, RemoteSource};
use crate::base::{AddrFamily, Candidate, FetchError, NetError};

/// Default connect timeout per attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout for the whole response body.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// What a successful fetch produced, including which sources were
/// attempted in order before one succeeded.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<Candidate>,
    /// Name of the source that supplied the records.
    pub source: String,
    /// Names of every source attempted, in order, including `source`.
    pub attempts: Vec<String>,
}

/// Fetches hosts documents from prioritized remote sources.
pub struct RemoteSourceFetcher {
    sources: Vec<RemoteSource>,
    retry: FetchRetry,
    connect_timeout: Duration,
    read_timeout: Duration,
    user_agent: String,
}

impl RemoteSourceFetcher {
    pub fn new(mut sources: Vec<RemoteSource>) -> Self {
        sources.sort_by_key(|s| s.rank);
        Self {
            sources,
            retry: FetchRetry::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: concat!("smarthosts/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_retry(mut self, retry: FetchRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Fetches and parses a document according to `mode`.
    pub async fn fetch(
        &self,
        mode: FetchMode,
        family: AddrFamily,
        filter: &DomainFilter,
    ) -> Result<FetchOutcome, FetchError> {
        let ordered: Vec<&RemoteSource> = match &mode {
            FetchMode::Automatic => self.sources.iter().collect(),
            FetchMode::Pinned(name) => {
                let source = self
                    .sources
                    .iter()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| FetchError::UnknownSource(name.clone()))?;
                vec![source]
            }
        };
        if ordered.is_empty() {
            return Err(FetchError::NoSources);
        }

        let mut attempts = Vec::new();
        let mut last_err: Option<NetError> = None;

        for source in ordered {
            attempts.push(source.name.clone());
            match self.fetch_source(source, family, filter).await {
                Ok(records) => {
                    tracing::info!(
                        source = %source.name,
                        records = records.len(),
                        "remote hosts fetched"
                    );
                    return Ok(FetchOutcome {
                        records,
                        source: source.name.clone(),
                        attempts,
                    });
                }
                Err(err) => {
                    tracing::warn!(source = %source.name, error = %err, "source failed, falling back");
                    last_err = Some(err);
                }
            }
        }

        Err(FetchError::AllSourcesFailed {
            attempted: attempts.len(),
            last: last_err,
        })
    }

    /// One source with its retry budget. Malformed content fails the
    /// source immediately; transient network errors and retryable HTTP
    /// statuses burn retry attempts.
    async fn fetch_source(
        &self,
        source: &RemoteSource,
        family: AddrFamily,
        filter: &DomainFilter,
    ) -> Result<Vec<Candidate>, NetError> {
        let mut last_err = NetError::ConnectionFailed;

        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            tracing::debug!(source = %source.name, attempt, "fetching");

            match self.fetch_body(&source.url).await {
                Ok(body) => {
                    if looks_like_html(&body) {
                        return Err(NetError::NotHostsDocument);
                    }
                    let records = parse_hosts_text(&body, family, filter);
                    if records.is_empty() {
                        return Err(NetError::EmptyDocument);
                    }
                    return Ok(records);
                }
                Err(err) => {
                    if !is_retryable(&err) || !self.retry.should_retry(attempt) {
                        return Err(err);
                    }
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// One GET request; returns the decoded response body.
    async fn fetch_body(&self, url: &Url) -> Result<String, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?.to_string();
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(NetError::InvalidUrl),
        };

        let addrs = timeout(
            self.connect_timeout,
            tokio::net::lookup_host((host.as_str(), port)),
        )
        .await
        .map_err(|_| NetError::ConnectionTimedOut)?
        .map_err(|e| NetError::from_io(&e))?;

        let mut stream = None;
        let mut connect_err = NetError::ConnectionFailed;
        for addr in addrs {
            match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(s)) => {
                    stream = Some(s);
                    break;
                }
                Ok(Err(e)) => connect_err = NetError::from_io(&e),
                Err(_) => connect_err = NetError::ConnectionTimedOut,
            }
        }
        let stream = stream.ok_or(connect_err)?;

        let request = build_request(url, &host, &self.user_agent);

        let raw = if tls {
            let builder = SslConnector::builder(SslMethod::tls())
                .map_err(|_| NetError::TlsHandshakeFailed)?;
            let config = builder
                .build()
                .configure()
                .map_err(|_| NetError::TlsHandshakeFailed)?;
            let mut tls_stream = timeout(self.connect_timeout, tokio_boring::connect(config, &host, stream))
                .await
                .map_err(|_| NetError::ConnectionTimedOut)?
                .map_err(|_| NetError::TlsHandshakeFailed)?;
            self.exchange(&mut tls_stream, &request).await?
        } else {
            let mut stream = stream;
            self.exchange(&mut stream, &request).await?
        };

        decode_response(&raw)
    }

    async fn exchange<S>(&self, stream: &mut S, request: &str) -> Result<BytesMut, NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| NetError::from_io(&e))?;

        let mut raw = BytesMut::with_capacity(16 * 1024);
        let read_all = async {
            let mut chunk = [0u8; 8192];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
            }
            Ok::<(), std::io::Error>(())
        };
        timeout(self.read_timeout, read_all)
            .await
            .map_err(|_| NetError::ConnectionTimedOut)?
            .map_err(|e| NetError::from_io(&e))?;

        Ok(raw)
    }
}

fn build_request(url: &Url, host: &str, user_agent: &str) -> String {
    let mut target = url.path().to_string();
    if target.is_empty() {
        target.push('/');
    }
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    format!(
        "GET {target} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: {user_agent}\r\n\
         Accept: text/plain, */*\r\n\
         Connection: close\r\n\r\n"
    )
}

/// Splits status line, headers and body; enforces 2xx; undoes chunked
/// transfer coding when present.
fn decode_response(raw: &[u8]) -> Result<String, NetError> {
    let header_end = find_subsequence(raw, b"\r\n\r\n").ok_or(NetError::MalformedResponse)?;
    let head = String::from_utf8_lossy(&raw[..header_end]);
    let body = &raw[header_end + 4..];

    let mut lines = head.lines();
    let status_line = lines.next().ok_or(NetError::MalformedResponse)?;
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or(NetError::MalformedResponse)?;
    if !(200..300).contains(&status) {
        return Err(NetError::HttpStatus(status));
    }

    let mut chunked = false;
    let mut html_content_type = false;
    for line in lines {
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("transfer-encoding:") {
            chunked = value.contains("chunked");
        } else if let Some(value) = lower.strip_prefix("content-type:") {
            html_content_type = value.contains("text/html");
        }
    }

    let body = if chunked {
        decode_chunked(body)?
    } else {
        body.to_vec()
    };
    let text = String::from_utf8_lossy(&body).into_owned();

    if html_content_type && looks_like_html(&text) {
        return Err(NetError::NotHostsDocument);
    }
    Ok(text)
}

fn decode_chunked(mut body: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::with_capacity(body.len());
    loop {
        let line_end = find_subsequence(body, b"\r\n").ok_or(NetError::MalformedResponse)?;
        let size_line = std::str::from_utf8(&body[..line_end])
            .map_err(|_| NetError::MalformedResponse)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| NetError::MalformedResponse)?;
        body = &body[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if body.len() < size + 2 {
            return Err(NetError::MalformedResponse);
        }
        out.extend_from_slice(&body[..size]);
        body = &body[size + 2..];
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_retryable(err: &NetError) -> bool {
    match err {
        NetError::ConnectionTimedOut
        | NetError::ConnectionRefused
        | NetError::ConnectionReset
        | NetError::ConnectionAborted
        | NetError::ConnectionFailed => true,
        NetError::HttpStatus(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
        _ => false,
    }
}
