//! HTTP connection handling module
//!
//! - [`HttpConnection`]: reads requests off a stream, calls the handler and
//!   writes responses back, keeping the connection alive when both sides agree

mod http_connection;

pub use http_connection::HttpConnection;
