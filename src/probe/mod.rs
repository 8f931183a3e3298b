//! Probe module for reachability checks.
//!
//! A [`Prober`] answers "is this host reachable, and how fast". The monitor
//! only sees the [`PingResponse`] contract; whether the check runs locally
//! over TCP or on a remote endpoint is a deployment choice.

mod http;
mod tcp;

pub use http::*;
pub use tcp::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure to execute a probe at all.
///
/// An unreachable host is not one of these: it comes back as a
/// [`PingResponse`] with `success: false`.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("probe endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed probe response: {0}")]
    Decode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Body returned by the reachability endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PingResponse {
    pub fn reachable(response_time_ms: f64) -> Self {
        Self {
            success: true,
            response_time: Some(response_time_ms),
            error: None,
        }
    }

    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response_time: None,
            error: Some(error.into()),
        }
    }
}

/// Something that can check reachability of a host.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn ping(&self, host: &str) -> Result<PingResponse, ProbeError>;
}
