//! Remote reachability endpoint client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{PingResponse, ProbeError, Prober};

/// Path of the connectivity test on a remote towerwatch-compatible server.
pub const TEST_CONNECTIVITY_PATH: &str = "/api/network-monitoring/test-connectivity";

#[derive(Debug, Serialize)]
struct TestConnectivityRequest<'a> {
    ip_address: &'a str,
}

/// Delegates probes to a remote endpoint speaking the [`PingResponse`]
/// contract.
pub struct HttpProber {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProber {
    /// Create a prober for the server at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let base = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}{}", base, TEST_CONNECTIVITY_PATH),
            timeout,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn ping(&self, host: &str) -> Result<PingResponse, ProbeError> {
        let response = self
            .client
            .post(&self.url)
            .json(&TestConnectivityRequest { ip_address: host })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        response
            .json::<PingResponse>()
            .await
            .map_err(|e| ProbeError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_url_normalization() {
        let p = HttpProber::new("monitor.local:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            p.url,
            "http://monitor.local:8080/api/network-monitoring/test-connectivity"
        );
    }

    #[tokio::test]
    async fn test_http_probe_decodes_failure_body() {
        let router = Router::new().route(
            TEST_CONNECTIVITY_PATH,
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["ip_address"], "10.0.0.9");
                Json(serde_json::json!({
                    "success": false,
                    "responseTime": 0,
                    "error": "Connection failed"
                }))
            }),
        );
        let base = serve(router).await;

        let prober = HttpProber::new(&base, Duration::from_secs(2)).unwrap();
        let resp = prober.ping("10.0.0.9").await.unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Connection failed"));
    }

    #[tokio::test]
    async fn test_http_probe_status_is_execution_error() {
        let router = Router::new().route(
            TEST_CONNECTIVITY_PATH,
            post(|| async { (StatusCode::UNAUTHORIZED, "nope") }),
        );
        let base = serve(router).await;

        let prober = HttpProber::new(&base, Duration::from_secs(2)).unwrap();
        let err = prober.ping("10.0.0.9").await.unwrap_err();
        assert!(matches!(err, ProbeError::Status(401)));
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_endpoint() {
        let prober = HttpProber::new("http://256.256.256.256", Duration::from_millis(100)).unwrap();
        assert!(prober.ping("10.0.0.9").await.is_err());
    }
}
