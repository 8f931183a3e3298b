//! Local TCP reachability probe.
//!
//! Tower radios rarely answer ICMP from unprivileged processes, so a host
//! counts as reachable when any of a handful of well-known ports accepts a
//! TCP connection.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use super::{PingResponse, ProbeError, Prober};

/// Ports tried in parallel: HTTP, HTTPS, SSH and the portal's own port.
pub const DEFAULT_PORTS: [u16; 4] = [80, 443, 22, 3007];

/// Per-port connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub struct TcpProber {
    ports: Vec<u16>,
    connect_timeout: Duration,
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PORTS.to_vec(), DEFAULT_CONNECT_TIMEOUT)
    }
}

impl TcpProber {
    pub fn new(ports: Vec<u16>, connect_timeout: Duration) -> Self {
        Self {
            ports,
            connect_timeout,
        }
    }
}

/// Connect to one port and return the handshake time in milliseconds.
async fn connect_once(host: String, port: u16, timeout: Duration) -> Result<f64, ProbeError> {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
        Ok(Ok(_stream)) => Ok(start.elapsed().as_millis() as f64),
        Ok(Err(e)) => Err(ProbeError::Network(format!("{}:{}: {}", host, port, e))),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn ping(&self, host: &str) -> Result<PingResponse, ProbeError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ProbeError::Config("empty host address".to_string()));
        }
        if self.ports.is_empty() {
            return Err(ProbeError::Config("no ports to probe".to_string()));
        }

        let mut attempts = JoinSet::new();
        for &port in &self.ports {
            attempts.spawn(connect_once(host.to_string(), port, self.connect_timeout));
        }

        // First port to answer wins; the rest are aborted when the set drops.
        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok(Ok(latency_ms)) => return Ok(PingResponse::reachable(latency_ms)),
                Ok(Err(e)) => tracing::debug!("TCP probe attempt failed: {}", e),
                Err(e) => tracing::warn!("TCP probe task for {} failed: {}", host, e),
            }
        }

        Ok(PingResponse::unreachable("Connection failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_port_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let prober = TcpProber::new(vec![port], Duration::from_secs(1));
        let resp = prober.ping("127.0.0.1").await.unwrap();
        assert!(resp.success);
        assert!(resp.response_time.is_some());
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable_not_an_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let prober = TcpProber::new(vec![port], Duration::from_millis(500));
        let resp = prober.ping("127.0.0.1").await.unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Connection failed"));
    }

    #[tokio::test]
    async fn test_empty_host_is_config_error() {
        let prober = TcpProber::default();
        assert!(matches!(prober.ping("  ").await, Err(ProbeError::Config(_))));
    }
}
