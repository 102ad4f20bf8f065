//! A small asynchronous HTTP/1.1 server layer
//!
//! This crate accepts bytes from a socket and hands complete requests to a
//! [`handler::Handler`], then writes the returned responses back. It is the
//! transport underneath `tern-web` and knows nothing about routing.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use tern_http::connection::HttpConnection;
//! use tern_http::handler::make_handler;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 error!(cause = %e, "connection shutdown with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(_request: Request<Bytes>) -> Result<Response<Bytes>, Infallible> {
//!     Ok(Response::new(Bytes::from_static(b"Hello World!\r\n")))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: keep-alive loop and shutdown handling
//! - [`codec`]: request decoding and response encoding
//! - [`handler`]: the request handler trait
//! - [`protocol`]: error types
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Request bodies are buffered and must carry `Content-Length`

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
