use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, StatusCode};
use thiserror::Error;

use crate::context::RequestContext;
use crate::params::ParamError;
use crate::render::RenderError;
use crate::signer::SignerError;

pub type HandlerResult = Result<Response<Bytes>, HandlerError>;

pub type BoxedHandler = Box<dyn RequestHandler>;

/// Handles one request. The context is moved in, so the handler (or the
/// middleware in front of it) is its only owner and renders it at most once.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult {
        (**self).invoke(ctx).await
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult {
        (**self).invoke(ctx).await
    }
}

/// Errors a handler hands back instead of a response.
///
/// The server turns them into a status code and a generic body; the message
/// itself only reaches the log.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("handler timed out after {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn bad_request<S: ToString>(reason: S) -> Self {
        Self::BadRequest(reason.to_string())
    }

    pub fn internal<E: Into<Box<dyn Error + Send + Sync>>>(cause: E) -> Self {
        Self::Internal(cause.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) | HandlerError::Param(_) => StatusCode::BAD_REQUEST,
            HandlerError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::Render(_) | HandlerError::Signer(_) | HandlerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// a handler made from an async fn taking the request context
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    async fn about(ctx: RequestContext) -> HandlerResult {
        Ok(ctx.render_text("about"))
    }

    #[test]
    fn async_fn_is_handler() {
        let handler = handler_fn(about);
        assert_is_handler(&handler);

        let boxed: BoxedHandler = Box::new(handler);
        assert_is_handler(&boxed);
    }

    #[test]
    fn status_of_errors() {
        assert_eq!(HandlerError::bad_request("no body").status(), StatusCode::BAD_REQUEST);
        assert_eq!(HandlerError::from(ParamError::Missing { name: "id".into() }).status(), StatusCode::BAD_REQUEST);
        assert_eq!(HandlerError::internal("id is zero").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(HandlerError::Timeout(Duration::from_secs(1)).status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
