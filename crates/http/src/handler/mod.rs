//! The seam between a connection and the application.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

/// Turns one decoded request into one response.
///
/// An `Err` is logged by the connection and answered with a bare
/// `500 Internal Server Error`; the connection keeps serving.
#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, Err> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>, Err>> + Send,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    type Error = Err;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, Fut, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut,
    Fut: Future<Output = Result<Response<Bytes>, Err>>,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    HandlerFn { f }
}
