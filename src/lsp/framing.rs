//! HTTP-style message framing: `Header: value` lines, a blank line, then a
//! body of exactly `Content-Length` bytes.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::trace;

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const DEFAULT_CONTENT_TYPE: &str = "application/vscode-jsonrpc; charset=utf-8";

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("End of stream")]
    Eof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header line: {0:?}")]
    InvalidHeader(String),

    #[error("No headers before the header terminator")]
    NoHeaders,

    #[error("Missing 'Content-Length' header")]
    MissingContentLength,

    #[error("Invalid 'Content-Length' header value: {0:?}")]
    InvalidContentLength(String),

    #[error("Body ended after {got} of {expected} bytes")]
    TruncatedBody { expected: usize, got: usize },
}

/// One framed message: its headers (with `Content-Type` defaulted) and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

fn strip_header_whitespace(value: &str) -> &str {
    value.trim_matches([' ', '\t'])
}

/// Read one header line, without its terminator. None marks the blank
/// separator line.
fn read_header_line(reader: &mut dyn BufRead) -> Result<Option<(String, String)>, FramingError> {
    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Err(FramingError::Eof);
    }

    let line = line.trim_end_matches('\n').trim_end_matches('\r');
    if line.is_empty() {
        trace!("read_header_line: end of headers");
        return Ok(None);
    }

    let Some(colon) = line.find(':') else {
        return Err(FramingError::InvalidHeader(line.to_string()));
    };

    let key = strip_header_whitespace(&line[..colon]).to_string();
    let value = strip_header_whitespace(&line[colon + 1..]).to_string();

    trace!("read_header_line: (\"{key}\", \"{value}\")");

    Ok(Some((key, value)))
}

/// Read one complete frame from the stream. [`FramingError::Eof`] means the
/// peer closed the stream at a message boundary.
pub fn read_frame(reader: &mut dyn BufRead) -> Result<Frame, FramingError> {
    let mut headers = HashMap::new();

    while let Some((key, value)) = read_header_line(reader)? {
        headers.insert(key, value);
    }

    if headers.is_empty() {
        return Err(FramingError::NoHeaders);
    }

    let content_length = headers
        .get(CONTENT_LENGTH)
        .ok_or(FramingError::MissingContentLength)?;
    let content_length: usize = content_length
        .parse()
        .map_err(|_| FramingError::InvalidContentLength(content_length.clone()))?;

    headers
        .entry(CONTENT_TYPE.to_string())
        .or_insert_with(|| DEFAULT_CONTENT_TYPE.to_string());

    trace!("read_frame: Content-Length: {content_length}");

    let mut body = vec![0u8; content_length];
    let mut filled = 0usize;
    while filled < content_length {
        let read = reader.read(&mut body[filled..])?;
        if read == 0 {
            return Err(FramingError::TruncatedBody { expected: content_length, got: filled });
        }
        filled += read;
    }

    Ok(Frame { headers, body })
}

/// Write one frame: both headers are always emitted.
pub fn write_frame(writer: &mut dyn Write, body: &[u8]) -> std::io::Result<()> {
    write!(writer, "{CONTENT_LENGTH}: {}\r\n", body.len())?;
    write!(writer, "{CONTENT_TYPE}: {DEFAULT_CONTENT_TYPE}\r\n\r\n")?;
    writer.write_all(body)?;
    writer.flush()
}
