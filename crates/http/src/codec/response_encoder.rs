//! HTTP response encoder.
//!
//! Serializes a fully buffered `http::Response<Bytes>` as an HTTP/1.1 message.
//! The `Content-Length` header always reflects the body, whatever the handler
//! put there. Responses to `HEAD` keep that header but carry no body, see
//! [`ResponseEncoder::omit_next_body`].

use std::io::Write;
use std::mem;

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderValue, Response, header};
use tokio_util::codec::Encoder;

use crate::protocol::SendError;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

#[derive(Debug, Default)]
pub struct ResponseEncoder {
    omit_body: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next encoded response answers a `HEAD` request: its headers are
    /// written as usual, its body is dropped.
    pub fn omit_next_body(&mut self) {
        self.omit_body = true;
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, body) = item.into_parts();

        dst.reserve(INIT_HEADER_SIZE + body.len());
        write!(
            FastWrite(dst),
            "HTTP/1.1 {} {}\r\n",
            head.status.as_str(),
            head.status.canonical_reason().unwrap_or("")
        )?;

        head.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        for (header_name, header_value) in &head.headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        if !mem::take(&mut self.omit_body) {
            dst.put_slice(&body);
        }
        Ok(())
    }
}

/// Adapts a `BytesMut` to `io::Write` for the `write!` of the status line.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn encode_redirect() {
        let response = Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, "/login")
            .body(Bytes::new())
            .unwrap();

        let mut dst = BytesMut::new();
        ResponseEncoder::new().encode(response, &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 303 See Other\r\n"));
        assert!(text.contains("location: /login\r\n"));
        assert!(text.contains("content-length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn content_length_follows_body() {
        let response = Response::builder()
            .header(header::CONTENT_LENGTH, "999")
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Bytes::from_static(b"about"))
            .unwrap();

        let mut dst = BytesMut::new();
        ResponseEncoder::new().encode(response, &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 5\r\n"));
        assert!(!text.contains("999"));
        assert!(text.ends_with("\r\n\r\nabout"));
    }

    #[test]
    fn head_response_has_length_but_no_body() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.omit_next_body();
        encoder.encode(Response::new(Bytes::from_static(b"Not Found")), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.contains("content-length: 9\r\n"));
        assert!(text.ends_with("\r\n\r\n"));

        dst.clear();
        encoder.encode(Response::new(Bytes::from_static(b"about")), &mut dst).unwrap();
        assert!(std::str::from_utf8(&dst).unwrap().ends_with("\r\n\r\nabout"));
    }
}
