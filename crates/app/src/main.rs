use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tern_app::{AppConfig, StaticCredentials, build_server};
use tern_web::MiniJinjaTemplates;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(cause = %e, "failed to load environment file"),
    }

    let config = AppConfig::parse();
    config.validate()?;

    let templates = MiniJinjaTemplates::from_dir(&config.template_dir)?;
    let verifier = Arc::new(StaticCredentials::new(config.login_username.as_str(), config.login_password.as_str()));

    let server = build_server(&config, templates, verifier)?;
    info!(address = %server.address(), algorithm = %config.signature_algorithm, "starting tern");
    server.start().await?;
    Ok(())
}
