//! Response model and output.
//!
//! # Responsibilities
//! - Hold the origin status code and its raw header lines
//! - Hold the body as materialized bytes or as a live stream
//! - Save the body to disk or render the whole response to a writer
//!
//! # Design Decisions
//! - Header lines are kept verbatim in origin order; removal works on the
//!   literal line, so malformed origin names still participate
//! - The body variant is the output mode: exactly one representation is
//!   authoritative at any time
//! - Switching representation drops `Content-Length` and `Transfer-Encoding`,
//!   they describe framing that no longer applies
//! - A stream is consumed once; dropping it closes the handle

use std::fmt;
use std::path::Path;

use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyResult;
use crate::http::headers::normalize_name;

/// No response has been obtained yet, or the origin was unreachable.
pub const STATUS_UNSET: u16 = 0;
/// The origin answered but its status line could not be read.
pub const STATUS_UNPARSABLE: u16 = 299;
/// Reason phrase attached to strict prefix-rewrite rejections.
pub const PROXY_MISSED_REASON: &str = "Proxy Missed";

const CHUNK_SIZE: usize = 64 * 1024;

static FRAMING_HEADERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Content-Length|Transfer-Encoding)\s*:").expect("static pattern"));

/// A live body source.
pub enum BodyStream {
    /// A local file opened by the transport.
    File(tokio::fs::File),
    /// An upstream response whose body has not been read.
    Remote(reqwest::Response),
    /// Any other reader supplied by the embedding application.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl BodyStream {
    /// Next chunk, or `None` once the source is exhausted.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        match self {
            BodyStream::File(file) => read_chunk(file).await,
            BodyStream::Reader(reader) => read_chunk(reader).await,
            BodyStream::Remote(response) => response.chunk().await.map_err(std::io::Error::other),
        }
    }

    /// Copy the remainder into `writer`, returning the byte count.
    pub async fn copy_to<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> std::io::Result<u64> {
        let mut written = 0u64;
        while let Some(chunk) = self.next_chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Bytes>> {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    let n = reader.read_buf(&mut buf).await?;
    if n == 0 {
        Ok(None)
    } else {
        Ok(Some(buf.freeze()))
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyStream::File(_) => f.write_str("BodyStream::File"),
            BodyStream::Remote(r) => write!(f, "BodyStream::Remote({})", r.url()),
            BodyStream::Reader(_) => f.write_str("BodyStream::Reader"),
        }
    }
}

/// Response body in its current representation.
#[derive(Debug, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

/// Which body representation is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Buffered,
    Streaming,
}

/// Result of saving a response body to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written(u64),
    Failed(String),
}

/// A response flowing back through the pipeline.
#[derive(Debug, Default)]
pub struct ProxyResponse {
    code: u16,
    reason: Option<String>,
    headers: Vec<String>,
    body: ResponseBody,
    saved: Option<SaveOutcome>,
}

impl ProxyResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    /// Reason phrase override for the status line.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    /// The transport never obtained a response.
    pub fn is_miss(&self) -> bool {
        self.code == STATUS_UNSET
    }

    /// A strict prefix rewrite rejected the request before forwarding.
    pub fn is_proxy_miss(&self) -> bool {
        self.code == 404 && self.reason.as_deref() == Some(PROXY_MISSED_REASON)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn add_header(&mut self, line: impl Into<String>) {
        self.headers.push(line.into());
    }

    pub fn add_headers<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers.extend(lines.into_iter().map(Into::into));
    }

    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Replace every line for `name` (case-insensitive) with one new line.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = normalize_name(name);
        self.remove_named(&name);
        self.headers.push(format!("{name}: {value}"));
    }

    /// Remove every line whose header name equals `name`, ignoring case.
    pub fn remove_named(&mut self, name: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|line| {
            line.split_once(':')
                .map(|(n, _)| !n.trim().eq_ignore_ascii_case(name))
                .unwrap_or(true)
        });
        before - self.headers.len()
    }

    /// Remove every raw line matching `pattern`; returns how many went.
    pub fn remove_headers_matching(&mut self, pattern: &Regex) -> usize {
        let before = self.headers.len();
        self.headers.retain(|line| !pattern.is_match(line));
        before - self.headers.len()
    }

    /// Remove exactly the line at `index`.
    pub fn remove_header_at(&mut self, index: usize) -> Option<String> {
        (index < self.headers.len()).then(|| self.headers.remove(index))
    }

    /// First line matching `pattern`, with its index and capture groups.
    pub fn find_header(&self, pattern: &Regex) -> Option<(usize, Vec<Option<String>>)> {
        self.headers.iter().enumerate().find_map(|(index, line)| {
            pattern.captures(line).map(|caps| {
                let groups = caps
                    .iter()
                    .map(|m| m.map(|m| m.as_str().to_string()))
                    .collect();
                (index, groups)
            })
        })
    }

    /// Value of the first line named `name`, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    pub fn mode(&self) -> OutputMode {
        match self.body {
            ResponseBody::Stream(_) => OutputMode::Streaming,
            _ => OutputMode::Buffered,
        }
    }

    pub fn body_ref(&self) -> &ResponseBody {
        &self.body
    }

    /// Switch to streaming from `stream`.
    pub fn set_stream(&mut self, stream: BodyStream) {
        self.remove_headers_matching(&FRAMING_HEADERS);
        self.body = ResponseBody::Stream(stream);
    }

    /// Switch to a materialized body; any open stream is closed.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.remove_headers_matching(&FRAMING_HEADERS);
        self.body = ResponseBody::Bytes(body.into());
    }

    /// Take the live stream, leaving an empty body behind.
    pub fn take_stream(&mut self) -> Option<BodyStream> {
        match std::mem::take(&mut self.body) {
            ResponseBody::Stream(stream) => Some(stream),
            other => {
                self.body = other;
                None
            }
        }
    }

    /// Materialize and return the body. A stream is read to its end and
    /// closed; a failed read keeps whatever arrived before the failure.
    pub async fn body(&mut self) -> Bytes {
        if let Some(mut stream) = self.take_stream() {
            let mut buf = BytesMut::new();
            loop {
                match stream.next_chunk().await {
                    Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, read = buf.len(), "Body read failed");
                        break;
                    }
                }
            }
            self.body = ResponseBody::Bytes(buf.freeze());
        }
        match &self.body {
            ResponseBody::Bytes(bytes) => bytes.clone(),
            _ => Bytes::new(),
        }
    }

    /// Write the body to `path`, returning the byte count.
    ///
    /// A stream is copied and closed; materialized bytes are kept.
    pub async fn save_to_file(&mut self, path: impl AsRef<Path>) -> ProxyResult<u64> {
        let mut file = tokio::fs::File::create(path.as_ref()).await?;
        let written = match self.take_stream() {
            Some(mut stream) => stream.copy_to(&mut file).await?,
            None => {
                let bytes = match &self.body {
                    ResponseBody::Bytes(bytes) => bytes.clone(),
                    _ => Bytes::new(),
                };
                file.write_all(&bytes).await?;
                file.flush().await?;
                bytes.len() as u64
            }
        };
        Ok(written)
    }

    /// Outcome recorded by the save-to-file filter.
    pub fn saved(&self) -> Option<&SaveOutcome> {
        self.saved.as_ref()
    }

    pub fn set_saved(&mut self, outcome: SaveOutcome) {
        self.saved = Some(outcome);
    }

    /// Status code and reason as they appear on the wire. A miss is
    /// presented as `502`.
    pub fn status_line_parts(&self) -> (u16, String) {
        let code = if self.is_miss() { 502 } else { self.code };
        let reason = match (&self.reason, self.is_miss()) {
            (Some(reason), false) => reason.clone(),
            _ => StatusCode::from_u16(code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown")
                .to_string(),
        };
        (code, reason)
    }

    /// Render status line, every header line verbatim, then the body.
    /// Returns the number of body bytes written.
    pub async fn render<W: AsyncWrite + Unpin>(mut self, writer: &mut W) -> ProxyResult<u64> {
        let (code, reason) = self.status_line_parts();
        let mut head = format!("HTTP/1.1 {code} {reason}\r\n");
        for line in &self.headers {
            head.push_str(line);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        writer.write_all(head.as_bytes()).await?;

        let written = match self.take_stream() {
            Some(mut stream) => stream.copy_to(writer).await?,
            None => {
                let bytes = self.body().await;
                writer.write_all(&bytes).await?;
                writer.flush().await?;
                bytes.len() as u64
            }
        };
        Ok(written)
    }
}
