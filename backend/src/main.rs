use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use moneta_webhook::api::{router, AppState};
use moneta_webhook::config::Config;
use moneta_webhook::record_store::AirtableClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let missing = config.missing_required();
    if !missing.is_empty() {
        error!(?missing, "Required environment variables are not set");
    }

    let store = AirtableClient::new(&config.airtable_settings())?;
    let state = Arc::new(AppState::from_config(&config, Arc::new(store)));

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid BIND_ADDR {:?}", config.bind_addr))?;

    info!(%addr, response_format = ?config.response_format, "Webhook server started");

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await?;

    Ok(())
}
