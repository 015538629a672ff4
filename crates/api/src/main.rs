use anyhow::Context;

use adminkit_api::app::{AppServices, build_app};
use adminkit_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("reading configuration")?;
    adminkit_observability::init(config.log_format);
    if config.used_default_secret {
        tracing::warn!("JWT secret not set; using insecure dev default");
    }

    let services = AppServices::from_config(&config).context("initializing the console store")?;
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
