//! HTTP request decoder.
//!
//! The decoder runs a two state machine over the read buffer:
//!
//! 1. `Head`: parse the request line and headers with `httparse`
//! 2. `Body`: wait until `Content-Length` bytes are buffered, then emit the request
//!
//! Bodies are buffered in full, which keeps the handler side simple: every
//! request is a plain `http::Request<Bytes>`. The size of a body is bounded by
//! [`RequestDecoder::with_max_body_size`]. Chunked request bodies are refused.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use std::mem;

use bytes::{Buf, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Body limit used by [`RequestDecoder::new`]
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Decodes a byte stream into complete, body-buffered requests.
#[derive(Debug)]
pub struct RequestDecoder {
    max_body_size: usize,
    state: DecodeState,
}

#[derive(Debug)]
enum DecodeState {
    Head,
    Body { parts: Parts, length: usize },
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY_SIZE)
    }

    pub fn with_max_body_size(max_body_size: usize) -> Self {
        Self { max_body_size, state: DecodeState::Head }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request<Bytes>;
    type Error = ParseError;

    /// # Returns
    ///
    /// - `Ok(Some(request))`: a request with its whole body
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: the peer sent a request we refuse to process
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if matches!(self.state, DecodeState::Head) {
            let Some((parts, length)) = decode_head(src)? else {
                return Ok(None);
            };

            let max_size = self.max_body_size;
            let length = usize::try_from(length)
                .ok()
                .filter(|length| *length <= max_size)
                .ok_or_else(|| ParseError::too_large_body(length, max_size))?;

            self.state = DecodeState::Body { parts, length };
        }

        let DecodeState::Body { length, .. } = &self.state else {
            return Ok(None);
        };

        if src.len() < *length {
            src.reserve(*length - src.len());
            return Ok(None);
        }

        match mem::replace(&mut self.state, DecodeState::Head) {
            DecodeState::Body { parts, length } => {
                let body = src.split_to(length).freeze();
                Ok(Some(Request::from_parts(parts, body)))
            }
            DecodeState::Head => Ok(None),
        }
    }
}

/// Parses the request line and headers, consuming them from `src`.
///
/// Returns the request parts and the announced body length.
fn decode_head(src: &mut BytesMut) -> Result<Option<(Parts, u64)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut req = httparse::Request::new(&mut headers);

    let parsed = req.parse(src).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        httparse::Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_header(e),
    })?;

    let body_offset = match parsed {
        Status::Complete(body_offset) => body_offset,
        Status::Partial => {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        }
    };

    trace!(header_size = body_offset, "parsed request head");
    ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        v => return Err(ParseError::InvalidVersion(v)),
    };

    let method = req
        .method
        .and_then(|method| Method::from_bytes(method.as_bytes()).ok())
        .ok_or(ParseError::InvalidMethod)?;

    let uri = req.path.and_then(|path| Uri::try_from(path).ok()).ok_or(ParseError::InvalidUri)?;

    let mut header_map = HeaderMap::with_capacity(req.headers.len());
    for header in req.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
        header_map.append(name, value);
    }

    src.advance(body_offset);

    let (mut parts, ()) = Request::new(()).into_parts();
    parts.method = method;
    parts.uri = uri;
    parts.version = version;
    parts.headers = header_map;

    let length = payload_length(&parts.headers)?;
    Ok(Some((parts, length)))
}

/// Determines the body length according to RFC 9112 section 6.3.
fn payload_length(headers: &HeaderMap) -> Result<u64, ParseError> {
    if let Some(encoding) = headers.get(TRANSFER_ENCODING) {
        return Err(ParseError::unsupported_transfer_encoding(String::from_utf8_lossy(encoding.as_bytes())));
    }

    let mut values = headers.get_all(CONTENT_LENGTH).iter();
    let Some(first) = values.next() else {
        return Ok(0);
    };

    let length = parse_content_length(first)?;
    for value in values {
        ensure!(parse_content_length(value)? == length, ParseError::invalid_content_length("conflicting values"));
    }

    Ok(length)
}

fn parse_content_length(value: &HeaderValue) -> Result<u64, ParseError> {
    let value = value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;
    value.trim().parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {value} is not u64")))
}
