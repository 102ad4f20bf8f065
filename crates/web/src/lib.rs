//! Routing, middleware and signed-cookie authentication on top of `tern-http`.
//!
//! ```no_run
//! use tern_web::{HandlerResult, RequestContext, Server, handler_fn};
//!
//! async fn hello(ctx: RequestContext) -> HandlerResult {
//!     let name = ctx.path_params().require("name")?.to_owned();
//!     Ok(ctx.render_text(format!("hello {name}")))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder().get("/hello/:name", handler_fn(hello)).build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod context;
mod handler;
mod params;
mod server;

pub mod cookie;
pub mod middleware;
pub mod render;
pub mod router;
pub mod signer;

pub use context::{RequestContext, error_response};
pub use handler::{BoxedHandler, FnHandler, HandlerError, HandlerResult, RequestHandler, handler_fn};
pub use params::{ParamError, PathParams};
pub use render::{Format, MiniJinjaTemplates, RenderError, TemplateRenderer};
pub use router::{RouteError, Router};
pub use server::{DEFAULT_ADDRESS, Server, ServerBuildError, ServerBuilder, ServerConfig, ServerError, shutdown_signal};
pub use signer::{SignatureAlgorithm, Signer, SignerError};
