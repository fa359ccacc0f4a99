use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use element_editor::chat::OpenAiChat;
use element_editor::config::Config;
use element_editor::image_search::UnsplashSearch;
use element_editor::orchestrator::Orchestrator;
use element_editor::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    tracing::debug!(?config, "configuration loaded");

    let chat = OpenAiChat::new(
        &config.openai_api_key,
        &config.openai_base_url,
        &config.model,
        config.upstream_timeout(),
    )?;
    let mut orchestrator = Orchestrator::new(Arc::new(chat));

    match &config.unsplash_access_key {
        Some(key) => {
            let search =
                UnsplashSearch::new(key, &config.unsplash_base_url, config.upstream_timeout())?;
            orchestrator = orchestrator.with_image_search(Arc::new(search));
            tracing::info!("image search enabled");
        }
        None => tracing::info!("UNSPLASH_ACCESS_KEY not set, image search disabled"),
    }

    let addr = config.bind_addr().await?;
    server::serve(addr, AppState::new(orchestrator), shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
