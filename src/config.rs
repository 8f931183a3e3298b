//! Configuration module for towerwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tuning knobs of the connectivity monitor.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Probes issued by one interactive burst.
    pub burst_size: usize,
    /// Pause between consecutive burst probes.
    pub burst_delay: Duration,
    /// Transitions within a burst window that count as flapping.
    pub flap_threshold: usize,
    /// Entries kept in the network event log (and flap event buffer).
    pub log_capacity: usize,
    /// Delay before the first background sweep.
    pub sweep_initial_delay: Duration,
    /// Period of the background sweep.
    pub sweep_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            burst_size: 5,
            burst_delay: Duration::from_millis(1000),
            flap_threshold: 2,
            log_capacity: 100,
            sweep_initial_delay: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite tower registry (default: "towerwatch.db")
    pub db_path: String,
    /// Base URL of a remote reachability endpoint. When unset, probes run
    /// locally over TCP.
    pub probe_url: Option<String>,
    /// Timeout for a single call to the probe collaborator (default: 5s)
    pub probe_timeout: Duration,
    pub monitor: MonitorSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "towerwatch.db".to_string(),
            probe_url: None,
            probe_timeout: Duration::from_millis(5000),
            monitor: MonitorSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TOWERWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `TOWERWATCH_DB_PATH`: Database file path (default: "towerwatch.db")
    /// - `TOWERWATCH_PROBE_URL`: remote probe endpoint base URL (default: unset)
    /// - `TOWERWATCH_PROBE_TIMEOUT_MS`: probe call timeout (default: 5000)
    /// - `TOWERWATCH_SWEEP_INITIAL_DELAY_SECS`: first sweep delay (default: 30)
    /// - `TOWERWATCH_SWEEP_INTERVAL_SECS`: sweep period (default: 300)
    /// - `TOWERWATCH_BURST_DELAY_MS`: pause between burst probes (default: 1000)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var("TOWERWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Ok(db_path) = env::var("TOWERWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(url) = env::var("TOWERWATCH_PROBE_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                cfg.probe_url = Some(url.to_string());
            }
        }

        if let Some(ms) = parse_var::<u64>("TOWERWATCH_PROBE_TIMEOUT_MS") {
            cfg.probe_timeout = Duration::from_millis(ms.max(1));
        }

        if let Some(secs) = parse_var("TOWERWATCH_SWEEP_INITIAL_DELAY_SECS") {
            cfg.monitor.sweep_initial_delay = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>("TOWERWATCH_SWEEP_INTERVAL_SECS") {
            // A zero period would make tokio's interval panic.
            cfg.monitor.sweep_interval = Duration::from_secs(secs.max(1));
        }

        if let Some(ms) = parse_var("TOWERWATCH_BURST_DELAY_MS") {
            cfg.monitor.burst_delay = Duration::from_millis(ms);
        }

        cfg
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}
