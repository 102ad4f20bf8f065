//! Command line and environment configuration.
//!
//! Every flag can also be set through a `TERN_*` environment variable, and a
//! `.env` file in the working directory is loaded before parsing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tern_web::middleware::AuthConfig;
use tern_web::{DEFAULT_ADDRESS, ServerConfig, SignatureAlgorithm};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("public prefix `{0}` must start with '/'")]
    InvalidPublicPrefix(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tern", version, about = "users, addresses and a cookie login behind a tiny router")]
pub struct AppConfig {
    /// Address to listen on
    #[arg(long, env = "TERN_ADDRESS", default_value_t = DEFAULT_ADDRESS)]
    pub address: SocketAddr,

    /// Key for signing the auth cookie. When empty nobody can log in.
    #[arg(long, env = "TERN_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub secret_key: String,

    /// HMAC digest for the auth cookie: sha256, sha384, sha512 or sha1
    #[arg(long, env = "TERN_SIGNATURE_ALGORITHM", default_value_t = SignatureAlgorithm::Sha256)]
    pub signature_algorithm: SignatureAlgorithm,

    /// Directory holding index.html and login.html
    #[arg(long, env = "TERN_TEMPLATE_DIR", default_value = "public")]
    pub template_dir: PathBuf,

    /// Path prefixes served without login
    #[arg(long, env = "TERN_PUBLIC_PREFIXES", value_delimiter = ',', default_value = "/public")]
    pub public_prefixes: Vec<String>,

    #[arg(long, env = "TERN_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "TERN_SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// Mark the auth cookie `Secure`; turn on when TLS is terminated in front
    #[arg(long, env = "TERN_SECURE_COOKIES")]
    pub secure_cookies: bool,

    #[arg(long, env = "TERN_LOGIN_USERNAME", default_value = "tester")]
    pub login_username: String,

    #[arg(long, env = "TERN_LOGIN_PASSWORD", default_value = "12345", hide_env_values = true)]
    pub login_password: String,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(prefix) = self.public_prefixes.iter().find(|prefix| !prefix.starts_with('/')) {
            return Err(ConfigError::InvalidPublicPrefix(prefix.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("request timeout"));
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            ..ServerConfig::default()
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        self.public_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .fold(AuthConfig::default(), |config, prefix| config.with_public_prefix(prefix.as_str()))
    }
}
