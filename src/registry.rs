//! Read side of the tower registry, as seen by the monitor and the
//! feasibility tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DbError;
use crate::geo::Coordinate;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry storage error: {0}")]
    Db(#[from] DbError),
}

/// A registered node. Either optional field may be missing; consumers skip
/// targets lacking what they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryTarget {
    pub id: i64,
    pub display_name: String,
    pub host_address: Option<String>,
    pub coordinates: Option<Coordinate>,
}

impl RegistryTarget {
    /// Address to probe, if the target has a usable one.
    pub fn probe_address(&self) -> Option<&str> {
        self.host_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn list_targets(&self) -> Result<Vec<RegistryTarget>, RegistryError>;

    async fn get_target(&self, id: i64) -> Result<Option<RegistryTarget>, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_address() {
        let mut t = RegistryTarget {
            id: 1,
            display_name: "T1".to_string(),
            host_address: Some(" 10.0.0.1 ".to_string()),
            coordinates: None,
        };
        assert_eq!(t.probe_address(), Some("10.0.0.1"));
        t.host_address = Some("".to_string());
        assert_eq!(t.probe_address(), None);
        t.host_address = None;
        assert_eq!(t.probe_address(), None);
    }
}
