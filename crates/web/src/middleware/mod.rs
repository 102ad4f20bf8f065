//! Handler decoration.
//!
//! A [`Middleware`] wraps a handler into another handler. The server keeps
//! them in a [`MiddlewareChain`] and applies them in registration order, so
//! the middleware registered last ends up outermost and sees the request
//! first.

mod auth;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::handler::{BoxedHandler, HandlerResult, RequestHandler};

pub use auth::{AuthConfig, AuthHandler, AuthMiddleware};

/// Wraps a handler to another
pub trait Middleware: Send + Sync {
    fn wrap(&self, handler: BoxedHandler) -> BoxedHandler;
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        (**self).wrap(handler)
    }
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        (**self).wrap(handler)
    }
}

/// An ordered list of [`Middleware`].
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a middleware to the end of the chain, it will wrap outside all the others
    pub fn push<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        self.middlewares.iter().fold(handler, |handler, middleware| middleware.wrap(handler))
    }
}

/// The rest of the chain, as seen from inside a [`middleware_fn`].
#[derive(Clone)]
pub struct Next {
    handler: Arc<dyn RequestHandler>,
}

impl Next {
    pub async fn run(self, ctx: RequestContext) -> HandlerResult {
        self.handler.invoke(ctx).await
    }
}

pub struct MiddlewareFn<F> {
    f: Arc<F>,
}

/// Makes a [`Middleware`] out of an async fn taking the context and the
/// [`Next`] handler.
///
/// ```
/// use tern_web::middleware::{Next, middleware_fn};
/// use tern_web::{HandlerResult, RequestContext};
///
/// async fn log_path(ctx: RequestContext, next: Next) -> HandlerResult {
///     let path = ctx.path().to_owned();
///     let response = next.run(ctx).await;
///     tracing::info!(%path, "handled");
///     response
/// }
///
/// let _middleware = middleware_fn(log_path);
/// ```
pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn<F>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    MiddlewareFn { f: Arc::new(f) }
}

impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        Box::new(MiddlewareFnHandler { f: Arc::clone(&self.f), next: Next { handler: Arc::from(handler) } })
    }
}

struct MiddlewareFnHandler<F> {
    f: Arc<F>,
    next: Next,
}

#[async_trait]
impl<F, Fut> RequestHandler for MiddlewareFnHandler<F>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult {
        (self.f)(ctx, self.next.clone()).await
    }
}
