//! sitewatch - Website availability monitor
//!
//! Probes a fixed set of websites on a schedule, records every outcome in
//! SQLite and serves uptime ranges and daily summaries over HTTP.

mod config;
mod db;
mod probe;
mod scheduler;
mod status;
mod web;

use config::ServerConfig;
use db::Store;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting sitewatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    let sites = config::load_sites(&cfg.sites_path)?;
    tracing::info!("Monitoring {} sites from {}", sites.len(), cfg.sites_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");
    for site in &sites {
        tracing::debug!("{}: {} stored observations", site.short_name, store.count(&site.short_name)?);
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    // Start scheduler
    let client = probe::build_client(cfg.probe_timeout)?;
    let scheduler = Scheduler::new(
        store.clone(),
        client,
        sites.clone(),
        cfg.probe_interval,
        cfg.probe_timeout,
        shutdown.child_token(),
    );
    scheduler.start().await;

    // Start web server
    let server = Server::new(cfg, store, sites);
    let result = server.start(shutdown.clone()).await;

    // Stop probing even if the server failed
    scheduler.shutdown().await;
    result
}
