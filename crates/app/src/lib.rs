//! The tern application: a handful of user and address endpoints behind a
//! signed-cookie login.

pub mod config;
pub mod credential;
pub mod handlers;

use std::sync::Arc;

use tern_web::middleware::AuthMiddleware;
use tern_web::{Server, ServerBuildError, Signer, TemplateRenderer, handler_fn};
use tracing::warn;

pub use config::{AppConfig, ConfigError};
pub use credential::{Credential, CredentialVerifier, StaticCredentials};

use crate::handlers::LoginHandler;

/// Registers every route and the auth middleware.
pub fn build_server<T>(
    config: &AppConfig,
    templates: T,
    verifier: Arc<dyn CredentialVerifier>,
) -> Result<Server, ServerBuildError>
where
    T: TemplateRenderer + 'static,
{
    let signer = Arc::new(Signer::new(&config.secret_key, config.signature_algorithm));
    if !signer.is_configured() {
        warn!("secret key is empty, every login and auth cookie will be rejected");
    }

    let auth = config.auth_config();
    let login = LoginHandler::new(Arc::clone(&signer), verifier, auth.clone(), config.secure_cookies);

    Server::builder()
        .address(config.address)
        .config(config.server_config())
        .templates(templates)
        .get("/", handler_fn(handlers::index))
        .get("/about", handler_fn(handlers::about))
        .get("/users/:id", handler_fn(handlers::show_user))
        .get("/users/:user_id/addresses/:address_id", handler_fn(handlers::show_address))
        .post("/users", handler_fn(handlers::echo_params))
        .post("/users/:user_id/addresses", handler_fn(handlers::echo_params))
        .get(&auth.login_path, handler_fn(handlers::login_form))
        .post(&auth.login_path, login)
        .wrap(AuthMiddleware::new(signer, auth))
        .build()
}
