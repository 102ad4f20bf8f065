//! HTTP codec module for decoding requests and encoding responses
//!
//! Both halves plug into `tokio_util::codec::{FramedRead, FramedWrite}`:
//!
//! - [`RequestDecoder`]: bytes from the socket into `http::Request<Bytes>`
//! - [`ResponseEncoder`]: `http::Response<Bytes>` into bytes for the socket
//!
//! # Example
//!
//! ```no_run
//! use tern_http::codec::{RequestDecoder, ResponseEncoder};
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET / HTTP/1.1\r\n\r\n");
//! let request = decoder.decode(&mut buffer);
//! ```

mod request_decoder;
mod response_encoder;

pub use request_decoder::DEFAULT_MAX_BODY_SIZE;
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
