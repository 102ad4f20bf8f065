//! Request handlers of the application.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tern_web::cookie::{Cookie, SameSite, set_cookie};
use tern_web::middleware::AuthConfig;
use tern_web::{HandlerError, HandlerResult, RenderError, RequestContext, RequestHandler, Signer};
use tracing::info;

use crate::credential::{Credential, CredentialVerifier};

pub const INDEX_TEMPLATE: &str = "index.html";
pub const LOGIN_TEMPLATE: &str = "login.html";

const LOGIN_REQUIRED: &str = "required login";
const LOGIN_FAILED: &str = "username or password does not match";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub id: String,
    pub address_id: String,
}

pub async fn index(ctx: RequestContext) -> HandlerResult {
    let now = chrono::Local::now();
    Ok(ctx.render_template(INDEX_TEMPLATE, &json!({ "time": now.format("%Y-%m-%d %H:%M:%S %:z").to_string() }))?)
}

pub async fn about(ctx: RequestContext) -> HandlerResult {
    Ok(ctx.render_text("about"))
}

pub async fn show_user(ctx: RequestContext) -> HandlerResult {
    let id = ctx.path_params().require("id")?;
    if id == "0" {
        return Err(HandlerError::internal("id is zero"));
    }

    let user = User { id: id.to_owned(), address_id: String::new() };
    Ok(ctx.render_xml(&user)?)
}

pub async fn show_address(ctx: RequestContext) -> HandlerResult {
    let params = ctx.path_params();
    let user = User { id: params.require("user_id")?.to_owned(), address_id: params.require("address_id")?.to_owned() };
    Ok(ctx.render_json(&user)?)
}

/// Echoes path parameters, then submitted parameters, one `name=value` per line.
pub async fn echo_params(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form()?;

    let mut text = String::new();
    for (name, value) in ctx.path_params().iter().chain(form.iter().map(|(n, v)| (n.as_str(), v.as_str()))) {
        // writing into a String cannot fail
        let _ = writeln!(text, "{name}={value}");
    }
    Ok(ctx.render_text(text))
}

pub async fn login_form(ctx: RequestContext) -> HandlerResult {
    Ok(ctx.render_template(LOGIN_TEMPLATE, &json!({ "message": LOGIN_REQUIRED }))?)
}

/// `POST /login`: sets the auth cookie and redirects home, or shows the form
/// again with an error.
pub struct LoginHandler {
    signer: Arc<Signer>,
    verifier: Arc<dyn CredentialVerifier>,
    auth: AuthConfig,
    secure_cookies: bool,
}

impl LoginHandler {
    pub fn new(signer: Arc<Signer>, verifier: Arc<dyn CredentialVerifier>, auth: AuthConfig, secure_cookies: bool) -> Self {
        Self { signer, verifier, auth, secure_cookies }
    }

    fn auth_cookie(&self) -> Result<Cookie, HandlerError> {
        let value = self.signer.sign(&self.auth.verify_message)?;
        Ok(Cookie::new(self.auth.cookie_name.as_str(), value)
            .with_path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .with_same_site(SameSite::Lax))
    }
}

#[async_trait]
impl RequestHandler for LoginHandler {
    async fn invoke(&self, ctx: RequestContext) -> HandlerResult {
        let credential = ctx.form_as::<Credential>()?;

        if !self.verifier.verify(&credential) {
            info!(username = %credential.username, "login rejected");
            return Ok(ctx.render_template(LOGIN_TEMPLATE, &json!({ "message": LOGIN_FAILED }))?);
        }

        let cookie = self.auth_cookie()?;
        let mut response = ctx.redirect("/")?;
        set_cookie(&mut response, &cookie).map_err(RenderError::from)?;
        info!(username = %credential.username, "login succeeded");
        Ok(response)
    }
}
