//! Protocol level types shared by the codec and the connection.
//!
//! Requests leave the decoder as a fully buffered `http::Request<Bytes>` and
//! responses enter the encoder as `http::Response<Bytes>`, so the only types
//! defined here are the errors:
//!
//! - [`HttpError`]: top-level error of a connection
//! - [`ParseError`]: the peer sent something we could not decode
//! - [`SendError`]: the response could not be written

mod error;

pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
