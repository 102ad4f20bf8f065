//! The server: route registration, the per-request error boundary and the
//! accept loop.
//!
//! Routes and middleware are collected by a [`ServerBuilder`]. `build` wraps
//! every route handler (and the not-found handler) in the middleware chain
//! and freezes the route table; the resulting [`Server`] is immutable and
//! shared by all connections.

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use http::{Method, Request, Response, StatusCode};
use tern_http::codec::{DEFAULT_MAX_BODY_SIZE, RequestDecoder};
use tern_http::connection::HttpConnection;
use tern_http::handler::Handler;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::context::{RequestContext, error_response};
use crate::handler::{BoxedHandler, HandlerError, HandlerResult, RequestHandler, handler_fn};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::params::PathParams;
use crate::render::TemplateRenderer;
use crate::router::{RouteError, Router};

pub const DEFAULT_ADDRESS: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Deadline for one handler invocation, answered with `503` when exceeded.
    pub request_timeout: Duration,
    /// How long in-flight connections may keep running after shutdown starts.
    pub shutdown_grace: Duration,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error(transparent)]
    Route(#[from] RouteError),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },
}

struct PendingRoute {
    method: Method,
    pattern: String,
    handler: BoxedHandler,
}

macro_rules! method_routes {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Registers a `", stringify!($method), "` route.")]
            pub fn $name<H: RequestHandler + 'static>(self, pattern: &str, handler: H) -> Self {
                self.route(Method::$method, pattern, handler)
            }
        )*
    };
}

pub struct ServerBuilder {
    routes: Vec<PendingRoute>,
    middlewares: MiddlewareChain,
    not_found: Option<BoxedHandler>,
    templates: Option<Arc<dyn TemplateRenderer>>,
    address: SocketAddr,
    config: ServerConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            routes: Vec::new(),
            middlewares: MiddlewareChain::new(),
            not_found: None,
            templates: None,
            address: DEFAULT_ADDRESS,
            config: ServerConfig::default(),
        }
    }

    pub fn address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn templates<T: TemplateRenderer + 'static>(mut self, templates: T) -> Self {
        self.templates = Some(Arc::new(templates));
        self
    }

    /// Registers `handler` for `method` and `pattern`. Conflicts are reported by [`build`](Self::build).
    pub fn route<H: RequestHandler + 'static>(mut self, method: Method, pattern: &str, handler: H) -> Self {
        self.routes.push(PendingRoute { method, pattern: pattern.to_owned(), handler: Box::new(handler) });
        self
    }

    method_routes! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
    }

    /// Adds a middleware around every route. The last one added runs first.
    pub fn wrap<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Replaces the handler used when no route matches.
    pub fn not_found<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.not_found = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let mut router = Router::new();
        for PendingRoute { method, pattern, handler } in self.routes {
            router.insert(method, &pattern, self.middlewares.wrap(handler))?;
        }

        let not_found = self.not_found.unwrap_or_else(|| Box::new(handler_fn(default_not_found)));
        let not_found = self.middlewares.wrap(not_found);

        Ok(Server { router, not_found, templates: self.templates, address: self.address, config: self.config })
    }
}

async fn default_not_found(ctx: RequestContext) -> HandlerResult {
    Ok(ctx.render_error(StatusCode::NOT_FOUND, &"no route matched"))
}

pub struct Server {
    router: Router,
    not_found: BoxedHandler,
    templates: Option<Arc<dyn TemplateRenderer>>,
    address: SocketAddr,
    config: ServerConfig,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Runs one request through routing, middleware and the handler.
    ///
    /// Never fails: handler errors, panics and timeouts all become a
    /// response with a generic body.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        debug!(%method, %path, "dispatch request");

        let (handler, params): (&dyn RequestHandler, PathParams) = match self.router.at(&method, &path) {
            Ok(route_match) => route_match.into_parts(),
            Err(e) => {
                debug!(cause = %e, "fall back to not found handler");
                (self.not_found.as_ref(), PathParams::empty())
            }
        };

        let ctx = RequestContext::new(request, params, self.templates.clone());
        let invocation = AssertUnwindSafe(handler.invoke(ctx)).catch_unwind();

        match tokio::time::timeout(self.config.request_timeout, invocation).await {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(e))) => handler_error_response(&method, &path, e),
            Ok(Err(panic)) => {
                error!(%method, %path, panic = panic_message(panic.as_ref()), "handler panicked");
                error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Err(_elapsed) => handler_error_response(&method, &path, HandlerError::Timeout(self.config.request_timeout)),
        }
    }

    /// Accepts connections from `listener` until `shutdown` completes, then
    /// waits up to [`ServerConfig::shutdown_grace`] for open connections.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let grace = self.config.shutdown_grace;
        let max_body_size = self.config.max_body_size;
        let server = Arc::new(self);
        let tracker = TaskTracker::new();
        let token = CancellationToken::new();

        info!(address = ?listener.local_addr().ok(), routes = server.router.len(), "start listening");

        tokio::pin!(shutdown);
        loop {
            let (tcp_stream, remote_addr) = tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let handler = Arc::clone(&server);
            let token = token.clone();
            tracker.spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let decoder = RequestDecoder::with_max_body_size(max_body_size);
                let connection = HttpConnection::with_decoder(reader, writer, decoder).with_shutdown(token);
                match connection.process(handler).await {
                    Ok(()) => debug!(%remote_addr, "connection closed"),
                    Err(e) => warn!(%remote_addr, cause = %e, "connection closed with error"),
                }
            });
        }

        info!(open_connections = tracker.len(), "shutting down, draining connections");
        tracker.close();
        token.cancel();
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(open_connections = tracker.len(), ?grace, "grace period elapsed, abandoning connections");
        }
        info!("server stopped");
        Ok(())
    }

    /// Binds the configured address and serves until Ctrl-C or SIGTERM.
    pub async fn start(self) -> Result<(), ServerError> {
        let address = self.address;
        let listener = TcpListener::bind(address).await.map_err(|source| ServerError::Bind { address, source })?;
        self.serve(listener, shutdown_signal()).await
    }
}

#[async_trait]
impl Handler for Server {
    type Error = Infallible;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        Ok(self.dispatch(req).await)
    }
}

fn handler_error_response(method: &Method, path: &str, e: HandlerError) -> Response<Bytes> {
    let status = e.status();
    if status.is_server_error() {
        error!(%method, %path, status = status.as_u16(), cause = %e, "handler failed");
    } else {
        debug!(%method, %path, status = status.as_u16(), cause = %e, "request rejected");
    }
    error_response(status)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Completes on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(cause = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Next, middleware_fn};
    use http::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn about(ctx: RequestContext) -> HandlerResult {
        Ok(ctx.render_text("about"))
    }

    async fn show_user(ctx: RequestContext) -> HandlerResult {
        let id = ctx.path_params().require("id")?.to_owned();
        if id == "0" {
            return Err(HandlerError::internal("id is zero"));
        }
        Ok(ctx.render_text(id))
    }

    async fn numeric(ctx: RequestContext) -> HandlerResult {
        let id = ctx.path_params().parse::<u32>("id")?;
        Ok(ctx.render_text(id.to_string()))
    }

    async fn panics(_ctx: RequestContext) -> HandlerResult {
        panic!("handler blew up")
    }

    async fn sleepy(ctx: RequestContext) -> HandlerResult {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(ctx.render_text("late"))
    }

    fn server() -> Server {
        Server::builder()
            .get("/about", handler_fn(about))
            .get("/users/:id", handler_fn(show_user))
            .get("/numbers/:id", handler_fn(numeric))
            .get("/panic", handler_fn(panics))
            .get("/sleep", handler_fn(sleepy))
            .config(ServerConfig { request_timeout: Duration::from_millis(50), ..ServerConfig::default() })
            .build()
            .unwrap()
    }

    fn get(path: &str) -> Request<Bytes> {
        Request::get(path).body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn routes_and_params() {
        let server = server();

        let response = server.dispatch(get("/about")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&response.body()[..], b"about");

        let response = server.dispatch(get("/users/42")).await;
        assert_eq!(&response.body()[..], b"42");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let server = server();

        for request in [get("/nope"), get("/About"), Request::post("/about").body(Bytes::new()).unwrap()] {
            let response = server.dispatch(request).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(&response.body()[..], b"Not Found");
        }
    }

    #[tokio::test]
    async fn handler_error_then_next_request() {
        let server = server();

        let response = server.dispatch(get("/users/0")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&response.body()[..], b"Internal Server Error");

        let response = server.dispatch(get("/users/1")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn param_error_is_400() {
        let response = server().dispatch(get("/numbers/abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let server = server();

        let response = server.dispatch(get("/panic")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&response.body()[..], b"Internal Server Error");

        assert_eq!(server.dispatch(get("/about")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let response = server().dispatch(get("/sleep")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn duplicate_route_fails_build() {
        let result = Server::builder().get("/users/:id", handler_fn(about)).get("/users/:name", handler_fn(about)).build();
        assert!(matches!(result, Err(ServerBuildError::Route(RouteError::Duplicate { .. }))));
    }

    #[tokio::test]
    async fn middleware_wraps_routes_and_not_found() {
        let tag = middleware_fn(|ctx: RequestContext, next: Next| async move {
            let mut response = next.run(ctx).await?;
            response.headers_mut().insert("x-wrapped", HeaderValue::from_static("yes"));
            Ok::<_, HandlerError>(response)
        });
        let server = Server::builder().get("/about", handler_fn(about)).wrap(tag).build().unwrap();

        for path in ["/about", "/missing"] {
            let response = server.dispatch(get(path)).await;
            assert_eq!(response.headers()["x-wrapped"], "yes", "{path}");
        }
    }

    #[tokio::test]
    async fn custom_not_found_handler() {
        async fn gone(ctx: RequestContext) -> HandlerResult {
            let path = ctx.path().to_owned();
            Ok(ctx.render_error(StatusCode::GONE, &path))
        }

        let server = Server::builder().get("/about", handler_fn(about)).not_found(handler_fn(gone)).build().unwrap();

        let response = server.dispatch(get("/users/1")).await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(&response.body()[..], b"Gone");
        assert_eq!(server.dispatch(get("/about")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let serving = tokio::spawn(server().serve(listener, async {
            let _ = shutdown_rx.await;
        }));

        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(b"GET /about HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
        assert!(raw.ends_with("\r\n\r\nabout"), "{raw}");

        shutdown_tx.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }

    fn slow_server(handler_delay: Duration, shutdown_grace: Duration) -> Server {
        let slow = handler_fn(move |ctx: RequestContext| async move {
            tokio::time::sleep(handler_delay).await;
            Ok(ctx.render_text("drained"))
        });
        Server::builder()
            .get("/slow", slow)
            .config(ServerConfig { request_timeout: Duration::from_secs(30), shutdown_grace, ..ServerConfig::default() })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server = slow_server(Duration::from_millis(300), Duration::from_secs(5));
        let serving = tokio::spawn(server.serve(listener, async {
            let _ = shutdown_rx.await;
        }));

        // keep-alive request, the server decides to close after shutdown
        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
        assert!(raw.contains("connection: close\r\n"), "{raw}");
        assert!(raw.ends_with("\r\n\r\ndrained"), "{raw}");
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_gives_up_after_grace_period() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server = slow_server(Duration::from_secs(10), Duration::from_millis(100));
        let serving = tokio::spawn(server.serve(listener, async {
            let _ = shutdown_rx.await;
        }));

        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        let stopped = tokio::time::timeout(Duration::from_secs(2), serving).await;
        assert!(stopped.is_ok(), "serve kept waiting for the slow connection");
        stopped.unwrap().unwrap().unwrap();
    }
}
