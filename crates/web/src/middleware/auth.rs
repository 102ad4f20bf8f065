//! Signed-cookie authentication.
//!
//! A request passes when its path is public or it carries the auth cookie
//! whose value is the signature of [`AuthConfig::verify_message`]. Everything
//! else is redirected to the login page; a cookie that fails verification is
//! cleared on the way.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tracing::info;

use super::Middleware;
use crate::context::RequestContext;
use crate::cookie::{Cookie, CookieError, set_cookie};
use crate::handler::{BoxedHandler, HandlerResult, RequestHandler};
use crate::render::RenderError;
use crate::signer::Signer;

pub const DEFAULT_COOKIE_NAME: &str = "X_AUTH";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_VERIFY_MESSAGE: &str = "verified";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub cookie_name: String,
    /// Always reachable without a cookie, and where rejected requests are sent.
    pub login_path: String,
    /// The message whose signature is the cookie value
    pub verify_message: String,
    /// Path prefixes reachable without a cookie. Matching is per segment:
    /// `/public` covers `/public` and `/public/app.css`, not `/publicity`.
    pub public_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            verify_message: DEFAULT_VERIFY_MESSAGE.to_owned(),
            public_prefixes: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn with_public_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.public_prefixes.push(prefix.into());
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        has_segment_prefix(path, &self.login_path)
            || self.public_prefixes.iter().any(|prefix| has_segment_prefix(path, prefix))
    }
}

fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Public,
    Missing,
    Invalid,
    Valid,
}

#[derive(Clone)]
pub struct AuthMiddleware {
    signer: Arc<Signer>,
    config: Arc<AuthConfig>,
}

impl AuthMiddleware {
    pub fn new(signer: Arc<Signer>, config: AuthConfig) -> Self {
        Self { signer, config: Arc::new(config) }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl Middleware for AuthMiddleware {
    fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        Box::new(AuthHandler { handler, signer: Arc::clone(&self.signer), config: Arc::clone(&self.config) })
    }
}

/// The handler produced by [`AuthMiddleware`].
pub struct AuthHandler<H> {
    handler: H,
    signer: Arc<Signer>,
    config: Arc<AuthConfig>,
}

impl<H> AuthHandler<H> {
    fn check(&self, ctx: &RequestContext) -> Result<Verdict, CookieError> {
        if self.config.is_public(ctx.path()) {
            return Ok(Verdict::Public);
        }

        let verdict = match ctx.cookie(&self.config.cookie_name)? {
            None => Verdict::Missing,
            Some(value) if self.signer.verify(&self.config.verify_message, value) => Verdict::Valid,
            Some(_) => Verdict::Invalid,
        };
        Ok(verdict)
    }
}

#[async_trait]
impl<H: RequestHandler> RequestHandler for AuthHandler<H> {
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult {
        let verdict = match self.check(&ctx) {
            Ok(verdict) => verdict,
            Err(e) => return Ok(ctx.render_error(StatusCode::INTERNAL_SERVER_ERROR, &e)),
        };

        match verdict {
            Verdict::Public | Verdict::Valid => self.handler.invoke(ctx).await,
            Verdict::Missing => {
                info!(path = ctx.path(), "no auth cookie, redirect to login");
                Ok(ctx.redirect(&self.config.login_path)?)
            }
            Verdict::Invalid => {
                info!(path = ctx.path(), "auth cookie failed verification, redirect to login");
                let mut response = ctx.redirect(&self.config.login_path)?;
                let removal = Cookie::removal(self.config.cookie_name.as_str(), "/");
                set_cookie(&mut response, &removal).map_err(RenderError::from)?;
                Ok(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::signer::SignatureAlgorithm;
    use bytes::Bytes;
    use http::header::{COOKIE, LOCATION, SET_COOKIE};
    use http::{HeaderValue, Request, Response};

    const KEY: &str = "test-secret";

    fn auth(signer: Signer) -> BoxedHandler {
        let config = AuthConfig::default().with_public_prefix("/public");
        let middleware = AuthMiddleware::new(Arc::new(signer), config);
        middleware.wrap(Box::new(handler_fn(|ctx: RequestContext| async move { Ok(ctx.render_text("secret")) })))
    }

    fn signer() -> Signer {
        Signer::new(KEY, SignatureAlgorithm::Sha256)
    }

    async fn send(handler: &BoxedHandler, path: &str, cookie: Option<&str>) -> Response<Bytes> {
        let mut request = Request::get(path);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, HeaderValue::from_bytes(cookie.as_bytes()).unwrap());
        }
        let ctx = RequestContext::from_request(request.body(Bytes::new()).unwrap());
        handler.invoke(ctx).await.unwrap()
    }

    fn assert_redirect_to_login(response: &Response<Bytes>) {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");
    }

    #[test]
    fn public_prefix_is_segment_aware() {
        let config = AuthConfig::default().with_public_prefix("/public");

        assert!(config.is_public("/login"));
        assert!(config.is_public("/login/reset"));
        assert!(!config.is_public("/loginx"));
        assert!(config.is_public("/public"));
        assert!(config.is_public("/public/index.html"));
        assert!(!config.is_public("/publicity"));
        assert!(!config.is_public("/"));
        assert!(!config.is_public("/about"));
    }

    #[test]
    fn prefix_with_trailing_slash() {
        let config = AuthConfig::default().with_public_prefix("/assets/");
        assert!(config.is_public("/assets/app.css"));
        assert!(!config.is_public("/assets"));
    }

    #[tokio::test]
    async fn missing_cookie_redirects() {
        let handler = auth(signer());

        let response = send(&handler, "/about", None).await;
        assert_redirect_to_login(&response);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn valid_cookie_passes() {
        let handler = auth(signer());
        let cookie = format!("X_AUTH={}", signer().sign("verified").unwrap());

        let response = send(&handler, "/about", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&response.body()[..], b"secret");
    }

    #[tokio::test]
    async fn invalid_cookie_redirects_and_clears() {
        let handler = auth(signer());
        let forged = format!("X_AUTH={}", Signer::new("other", SignatureAlgorithm::Sha256).sign("verified").unwrap());

        for cookie in ["X_AUTH=", "X_AUTH=deadbeef", forged.as_str()] {
            let response = send(&handler, "/users/1", Some(cookie)).await;
            assert_redirect_to_login(&response);
            assert_eq!(response.headers()[SET_COOKIE], "X_AUTH=; Path=/; Max-Age=0");
        }
    }

    #[tokio::test]
    async fn public_paths_skip_auth() {
        let handler = auth(signer());

        for path in ["/login", "/public/index.html"] {
            let response = send(&handler, path, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
        assert_redirect_to_login(&send(&handler, "/publicity", None).await);
    }

    #[tokio::test]
    async fn unreadable_cookie_is_server_error() {
        let handler = auth(signer());

        let response = send(&handler, "/about", Some("X_AUTH=\u{e9}")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unconfigured_signer_rejects_everything() {
        let handler = auth(Signer::unconfigured());

        for cookie in ["X_AUTH=", "X_AUTH= ", "X_AUTH=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"] {
            assert_redirect_to_login(&send(&handler, "/", Some(cookie)).await);
        }
        assert_eq!(send(&handler, "/login", None).await.status(), StatusCode::OK);
    }
}
