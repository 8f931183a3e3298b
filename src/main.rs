//! Towerwatch - field operations backend for wireless ISPs.
//!
//! Serves the tower registry, geodesic link feasibility checks and the
//! connectivity monitor over one HTTP API.

mod config;
mod db;
mod geo;
mod monitor;
mod probe;
mod registry;
mod web;

use config::ServerConfig;
use db::Store;
use monitor::{Monitor, SweepScheduler};
use probe::{HttpProber, Prober, TcpProber};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("towerwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting towerwatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Add sample tower if none exist
    if store.get_towers()?.is_empty() {
        tracing::info!("Adding sample tower");
        let mut tower = db::Tower {
            name: "Sample Tower".to_string(),
            location: "Roorkee".to_string(),
            host_address: Some("8.8.8.8".to_string()),
            latitude: Some(29.9579),
            longitude: Some(77.7943),
            ..Default::default()
        };
        store.add_tower(&mut tower)?;
    }

    // The monitor goes through the remote endpoint when one is configured;
    // the local endpoint always probes directly.
    let local_prober: Arc<dyn Prober> = Arc::new(TcpProber::default());
    let monitor_prober: Arc<dyn Prober> = match &cfg.probe_url {
        Some(url) => {
            tracing::info!("Probing through {}", url);
            Arc::new(HttpProber::new(url, cfg.probe_timeout)?)
        }
        None => local_prober.clone(),
    };

    let monitor = Arc::new(Monitor::new(monitor_prober, cfg.monitor.clone()));

    // Start sweep
    let sweep = SweepScheduler::new(monitor.clone(), store.clone());
    sweep.start();

    // Start web server
    let server = Server::new(cfg, store, monitor, local_prober);
    let result = server.start(shutdown_signal()).await;

    sweep.stop();
    tracing::info!("Shutdown complete");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
