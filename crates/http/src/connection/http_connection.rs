use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::CONNECTION;
use http::{HeaderValue, Method, Request, Response, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::HttpError;

/// An HTTP/1.x connection that answers requests one after another.
///
/// `HttpConnection` handles the full lifecycle of a connection:
/// - Reading and decoding requests
/// - Calling the handler once per request
/// - Writing the response back
/// - Keeping the connection alive until the peer or the shutdown token ends it
///
/// Cancelling the shutdown token never interrupts a request that is being
/// handled; the connection closes once that response has been written.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    shutdown: CancellationToken,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_decoder(reader, writer, RequestDecoder::new())
    }

    pub fn with_decoder(reader: R, writer: W, decoder: RequestDecoder) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, decoder, 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
    {
        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    debug!("shutdown requested, close idle connection");
                    return Ok(());
                }
                next = self.framed_read.next() => next,
            };

            match next {
                Some(Ok(request)) => {
                    let keep_alive = wants_keep_alive(&request);
                    let is_head = *request.method() == Method::HEAD;
                    let response = match handler.call(request).await {
                        Ok(response) => response,
                        Err(e) => {
                            let cause: Box<dyn Error + Send + Sync> = e.into();
                            error!(cause = %cause, "handle request error");
                            build_error_response(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    };

                    let keep_alive = keep_alive && !self.shutdown.is_cancelled();
                    if is_head {
                        self.framed_write.encoder_mut().omit_next_body();
                    }
                    self.send_response(response, keep_alive).await?;

                    if !keep_alive {
                        return Ok(());
                    }
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    let error_response = build_error_response(e.status_code());
                    self.send_response(error_response, false).await?;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn send_response(&mut self, mut response: Response<Bytes>, keep_alive: bool) -> Result<(), HttpError> {
        if !keep_alive {
            response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        }
        self.framed_write.send(response).await?;
        Ok(())
    }
}

/// HTTP/1.1 defaults to persistent connections, HTTP/1.0 to one request.
fn wants_keep_alive<B>(request: &Request<B>) -> bool {
    let connection = request.headers().get(CONNECTION).map(HeaderValue::as_bytes);
    match request.version() {
        Version::HTTP_10 => connection.is_some_and(|value| value.eq_ignore_ascii_case(b"keep-alive")),
        _ => !connection.is_some_and(|value| value.eq_ignore_ascii_case(b"close")),
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status_code;
    response
}
