//! # Perspective News
//!
//! An HTTP service that shows how outlets of differing political lean cover
//! the same topic. A topic is searched across several external providers,
//! every result is classified against a curated outlet table, and the
//! left, center and right coverage is returned side by side with
//! third-party fact-check data attached.
//!
//! ## Features
//!
//! - Multi-provider search (Brave, Vertex AI Search, Perplexity, Firecrawl)
//!   with per-lean fallback escalation
//! - Outlet allow-lists and article-path filtering so only real articles
//!   from known outlets are returned
//! - Metadata repair for placeholder titles and snippets
//! - Fact-check enrichment from the Google Fact Check Tools API
//! - AI-generated topic framing that never touches article fields
//!
//! ## Usage
//!
//! ```sh
//! BRAVE_SEARCH_API_KEY=... LOVABLE_API_KEY=... perspective_news --listen 0.0.0.0:8787
//! ```
//!
//! ## Architecture
//!
//! Each request flows through:
//! 1. **Search**: providers are queried per lean, escalating until each lean has results
//! 2. **Repair**: placeholder titles and snippets are filled from the article page
//! 3. **Enrich**: fact-checks and topic metadata are fetched concurrently
//! 4. **Assemble**: articles are grouped into one perspective per lean

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod article_path;
mod assemble;
mod auth;
mod cli;
mod config;
mod error;
mod factcheck;
mod metadata;
mod models;
mod orchestrator;
mod outlets;
mod providers;
mod repair;
mod server;
mod text;
mod trending;
mod utils;

use cli::Cli;
use config::Config;
use server::{AppState, build_router};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "perspective_news starting up");

    let args = Cli::parse();
    let config = Config::load(&args).await?;
    if config.credentials.ai_gateway.is_none() {
        warn!("AI gateway key not configured; /search-perspectives will reject requests");
    }

    let http = providers::http_client()?;
    let state = Arc::new(AppState::new(config, http));

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(listen = %args.listen, "HTTP API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("perspective_news shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
