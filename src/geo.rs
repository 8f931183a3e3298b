//! Geodesic feasibility engine.
//!
//! Great-circle distance and initial bearing between a tower and a client
//! location, plus the distance-based feasibility ladder used when planning a
//! new link. Everything here is pure; coordinates are not validated, so
//! callers reject out-of-range input before calling in.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Width of one compass sector in degrees.
const SECTOR_DEG: f64 = 22.5;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Whether both components are finite and inside their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Haversine distance in kilometres.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial great-circle bearing from `from` towards `to`, in `[0, 360)`.
pub fn bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let d_lon = (to.longitude - from.longitude).to_radians();
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Return bearing as shown to field engineers: the forward bearing turned
/// around, not a second geodesic computation.
pub fn reverse_bearing_deg(bearing: f64) -> f64 {
    (bearing + 180.0) % 360.0
}

/// Sixteen-point compass rose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompassPoint {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl CompassPoint {
    const ALL: [CompassPoint; 16] = [
        CompassPoint::N,
        CompassPoint::NNE,
        CompassPoint::NE,
        CompassPoint::ENE,
        CompassPoint::E,
        CompassPoint::ESE,
        CompassPoint::SE,
        CompassPoint::SSE,
        CompassPoint::S,
        CompassPoint::SSW,
        CompassPoint::SW,
        CompassPoint::WSW,
        CompassPoint::W,
        CompassPoint::WNW,
        CompassPoint::NW,
        CompassPoint::NNW,
    ];

    /// Nearest compass point for a bearing in degrees.
    ///
    /// A NaN bearing lands on `N` (the float-to-index cast saturates to 0).
    pub fn from_bearing(bearing: f64) -> Self {
        let index = (bearing / SECTOR_DEG).round() as usize % Self::ALL.len();
        Self::ALL[index]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NNE => "NNE",
            CompassPoint::NE => "NE",
            CompassPoint::ENE => "ENE",
            CompassPoint::E => "E",
            CompassPoint::ESE => "ESE",
            CompassPoint::SE => "SE",
            CompassPoint::SSE => "SSE",
            CompassPoint::S => "S",
            CompassPoint::SSW => "SSW",
            CompassPoint::SW => "SW",
            CompassPoint::WSW => "WSW",
            CompassPoint::W => "W",
            CompassPoint::WNW => "WNW",
            CompassPoint::NW => "NW",
            CompassPoint::NNW => "NNW",
        }
    }
}

impl std::fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link feasibility by tower distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feasibility {
    Excellent,
    Good,
    Moderate,
    Challenging,
    NotRecommended,
}

impl Feasibility {
    /// Classify a distance in kilometres. First matching rung wins; a NaN
    /// distance fails every comparison and ends up `NotRecommended`.
    pub fn classify(distance_km: f64) -> Self {
        if distance_km <= 2.0 {
            Feasibility::Excellent
        } else if distance_km <= 5.0 {
            Feasibility::Good
        } else if distance_km <= 10.0 {
            Feasibility::Moderate
        } else if distance_km <= 15.0 {
            Feasibility::Challenging
        } else {
            Feasibility::NotRecommended
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Feasibility::Excellent => "Excellent",
            Feasibility::Good => "Good",
            Feasibility::Moderate => "Moderate",
            Feasibility::Challenging => "Challenging",
            Feasibility::NotRecommended => "Not Recommended",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Feasibility::Excellent => {
                "Ideal distance for high-speed connectivity. Minimal signal loss expected."
            }
            Feasibility::Good => "Good connectivity possible. Standard equipment should work well.",
            Feasibility::Moderate => {
                "Connectivity possible with proper equipment. Site survey recommended."
            }
            Feasibility::Challenging => "Long-range equipment required. Line of sight critical.",
            Feasibility::NotRecommended => {
                "Distance exceeds recommended range. Consider alternative tower or relay point."
            }
        }
    }
}

/// Outcome of a tower-to-client feasibility check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityResult {
    pub distance_km: f64,
    pub bearing_deg: f64,
    pub reverse_bearing_deg: f64,
    pub compass_direction: CompassPoint,
    pub classification: Feasibility,
    /// Display name of the classification, e.g. "Not Recommended".
    pub label: &'static str,
    pub message: String,
}

/// Evaluate a link from `tower` to `client`.
pub fn assess(tower: Coordinate, client: Coordinate) -> FeasibilityResult {
    let distance = distance_km(tower, client);
    let bearing = bearing_deg(tower, client);
    let classification = Feasibility::classify(distance);

    FeasibilityResult {
        distance_km: distance,
        bearing_deg: bearing,
        reverse_bearing_deg: reverse_bearing_deg(bearing),
        compass_direction: CompassPoint::from_bearing(bearing),
        classification,
        label: classification.label(),
        message: classification.message().to_string(),
    }
}

/// Pick the closest candidate to `client`. Candidates without coordinates
/// are skipped.
pub fn nearest<T, F>(client: Coordinate, candidates: &[T], coords: F) -> Option<(&T, f64)>
where
    F: Fn(&T) -> Option<Coordinate>,
{
    candidates
        .iter()
        .filter_map(|c| coords(c).map(|at| (c, distance_km(at, client))))
        .filter(|(_, d)| !d.is_nan())
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
