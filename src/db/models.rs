//! Database model types.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::registry::RegistryTarget;

/// A network tower as kept in the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tower {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub location: String,
    /// IP or hostname probed by the monitor.
    #[serde(default)]
    pub host_address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

impl Tower {
    /// Position of the tower, if both components are known.
    pub fn coordinates(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Collapse blank addresses to `None`.
    pub(crate) fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.host_address = self
            .host_address
            .take()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
    }
}

impl From<&Tower> for RegistryTarget {
    fn from(tower: &Tower) -> Self {
        RegistryTarget {
            id: tower.id,
            display_name: tower.name.clone(),
            host_address: tower.host_address.clone(),
            coordinates: tower.coordinates(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_need_both_components() {
        let mut tower = Tower {
            latitude: Some(29.9),
            ..Default::default()
        };
        assert!(tower.coordinates().is_none());
        tower.longitude = Some(77.8);
        assert_eq!(tower.coordinates(), Some(Coordinate::new(29.9, 77.8)));
    }

    #[test]
    fn test_normalize_blank_address() {
        let mut tower = Tower {
            name: " North Ridge ".to_string(),
            host_address: Some("   ".to_string()),
            ..Default::default()
        };
        tower.normalize();
        assert_eq!(tower.name, "North Ridge");
        assert_eq!(tower.host_address, None);
    }
}
