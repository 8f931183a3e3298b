//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, Tower};
use crate::geo::{self, Coordinate, FeasibilityResult};
use crate::monitor::{FlapEvent, LogEventType, MonitorError, NetworkLogEntry, TargetHealth};
use crate::registry::{RegistryTarget, TargetRegistry};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn db_error_response(e: DbError) -> Response {
    match e {
        DbError::NotFound => (StatusCode::NOT_FOUND, "Tower not found").into_response(),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
}

async fn find_target(state: &AppState, id: i64) -> Result<RegistryTarget, Response> {
    match state.store.get_target(id).await {
        Ok(Some(target)) => Ok(target),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Tower not found").into_response()),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()),
    }
}

// ============================================================================
// API: Towers
// ============================================================================

pub async fn handle_get_towers(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_towers() {
        Ok(towers) => Json(towers).into_response(),
        Err(e) => db_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TowerRequest {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub host_address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

impl TowerRequest {
    fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("Tower name is required");
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if !Coordinate::new(lat, lon).is_valid() => {
                Err("Coordinates out of range")
            }
            (Some(_), None) | (None, Some(_)) => {
                Err("Latitude and longitude must be given together")
            }
            _ => Ok(()),
        }
    }

    fn into_tower(self, id: i64) -> Tower {
        Tower {
            id,
            name: self.name,
            location: self.location,
            host_address: self.host_address,
            latitude: self.latitude,
            longitude: self.longitude,
            notes: self.notes,
        }
    }
}

pub async fn handle_create_tower(
    State(state): State<AppState>,
    Json(req): Json<TowerRequest>,
) -> impl IntoResponse {
    if let Err(msg) = req.validate() {
        return (StatusCode::BAD_REQUEST, msg).into_response();
    }

    let mut tower = req.into_tower(0);
    match state.store.add_tower(&mut tower) {
        Ok(_) => (StatusCode::CREATED, Json(tower)).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_update_tower(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TowerRequest>,
) -> impl IntoResponse {
    if let Err(msg) = req.validate() {
        return (StatusCode::BAD_REQUEST, msg).into_response();
    }

    let mut tower = req.into_tower(id);
    match state.store.update_tower(&mut tower) {
        Ok(_) => Json(tower).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_delete_tower(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.delete_tower(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Feasibility
// ============================================================================

/// Either a registered tower or explicit tower coordinates, plus the client
/// location.
#[derive(Debug, Deserialize)]
pub struct FeasibilityRequest {
    #[serde(default)]
    pub tower_id: Option<i64>,
    #[serde(default)]
    pub tower: Option<Coordinate>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct FeasibilityResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_name: Option<String>,
    pub tower: Coordinate,
    pub client: Coordinate,
    #[serde(flatten)]
    pub result: FeasibilityResult,
}

pub async fn handle_feasibility(
    State(state): State<AppState>,
    Json(req): Json<FeasibilityRequest>,
) -> impl IntoResponse {
    let client = Coordinate::new(req.latitude, req.longitude);
    if !client.is_valid() {
        return (StatusCode::BAD_REQUEST, "Client coordinates out of range").into_response();
    }

    let (tower_id, tower_name, tower_at) = match (req.tower_id, req.tower) {
        (Some(id), _) => {
            let target = match find_target(&state, id).await {
                Ok(t) => t,
                Err(resp) => return resp,
            };
            match target.coordinates {
                Some(at) => (Some(id), Some(target.display_name), at),
                None => {
                    return (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "Tower has no coordinates",
                    )
                        .into_response()
                }
            }
        }
        (None, Some(at)) => (None, None, at),
        (None, None) => {
            return (StatusCode::BAD_REQUEST, "Either tower_id or tower is required")
                .into_response()
        }
    };

    if !tower_at.is_valid() {
        return (StatusCode::BAD_REQUEST, "Tower coordinates out of range").into_response();
    }

    Json(FeasibilityResponse {
        tower_id,
        tower_name,
        tower: tower_at,
        client,
        result: geo::assess(tower_at, client),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct NearestResponse {
    pub tower: Tower,
    #[serde(flatten)]
    pub result: FeasibilityResult,
}

pub async fn handle_nearest_tower(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> impl IntoResponse {
    let client = Coordinate::new(query.latitude, query.longitude);
    if !client.is_valid() {
        return (StatusCode::BAD_REQUEST, "Client coordinates out of range").into_response();
    }

    let towers = match state.store.get_towers() {
        Ok(t) => t,
        Err(e) => return db_error_response(e),
    };

    match geo::nearest(client, &towers, Tower::coordinates) {
        Some((tower, _)) => {
            // nearest() only yields towers with coordinates
            let at = tower.coordinates().unwrap_or(client);
            Json(NearestResponse {
                tower: tower.clone(),
                result: geo::assess(at, client),
            })
            .into_response()
        }
        None => (StatusCode::NOT_FOUND, "No tower with coordinates").into_response(),
    }
}

// ============================================================================
// API: Monitoring
// ============================================================================

fn monitor_error_response(e: MonitorError) -> Response {
    match e {
        MonitorError::MissingAddress(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
        MonitorError::BurstInProgress(_) => (StatusCode::CONFLICT, e.to_string()).into_response(),
        MonitorError::Probe(_) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
        MonitorError::InvalidTransition { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn handle_probe(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    let target = match find_target(&state, id).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match state.monitor.probe_once(&target).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            tracing::warn!("Probe of {} failed to execute: {}", target.display_name, e);
            monitor_error_response(e)
        }
    }
}

pub async fn handle_start_burst(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let target = match find_target(&state, id).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let ticket = match state.monitor.begin_burst(&target).await {
        Ok(ticket) => ticket,
        Err(e) => return monitor_error_response(e),
    };

    let monitor = state.monitor.clone();
    tokio::spawn(async move {
        let name = ticket.target().display_name.clone();
        if let Err(e) = monitor.drive_burst(ticket).await {
            tracing::error!("Burst for {} aborted: {}", name, e);
        }
    });

    match state.monitor.burst_view(id).await {
        Some(view) => (StatusCode::ACCEPTED, Json(view)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

pub async fn handle_get_burst(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.monitor.burst_view(id).await {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NOT_FOUND, "No burst recorded for this tower").into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub target_id: i64,
    #[serde(flatten)]
    pub health: TargetHealth,
    pub flap_count: u64,
}

pub async fn handle_health(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    Json(HealthResponse {
        target_id: id,
        health: state.monitor.health(id).await,
        flap_count: state.monitor.flap_count(id).await,
    })
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub target_id: Option<i64>,
}

pub async fn handle_get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<NetworkLogEntry>> {
    Json(state.monitor.logs(query.target_id).await)
}

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub target_id: i64,
    pub event_type: LogEventType,
    pub message: String,
}

pub async fn handle_post_log(
    State(state): State<AppState>,
    Json(req): Json<LogRequest>,
) -> impl IntoResponse {
    // Ping and flapping entries come from the probe path only.
    if matches!(req.event_type, LogEventType::Ping | LogEventType::Flapping) {
        return (StatusCode::BAD_REQUEST, "Event type is reserved for the monitor").into_response();
    }
    if req.message.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Message is required").into_response();
    }

    let entry = state
        .monitor
        .record_event(req.target_id, req.event_type, req.message)
        .await;
    (StatusCode::CREATED, Json(entry)).into_response()
}

#[derive(Debug, Serialize)]
pub struct FlapsResponse {
    pub counts: HashMap<i64, u64>,
    pub events: Vec<FlapEvent>,
}

pub async fn handle_get_flaps(State(state): State<AppState>) -> Json<FlapsResponse> {
    Json(FlapsResponse {
        counts: state.monitor.flap_counts().await,
        events: state.monitor.flap_events().await,
    })
}

// ============================================================================
// Reachability endpoint
// ============================================================================

/// Accepts the address under any of the names older clients send.
#[derive(Debug, Default, Deserialize)]
pub struct TestConnectivityRequest {
    #[serde(default, rename = "targetIP")]
    pub target_ip_camel: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub target_ip: Option<String>,
}

impl TestConnectivityRequest {
    fn host(&self) -> Option<&str> {
        [&self.target_ip_camel, &self.ip_address, &self.target_ip]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

pub async fn handle_test_connectivity(
    State(state): State<AppState>,
    Json(req): Json<TestConnectivityRequest>,
) -> impl IntoResponse {
    let Some(host) = req.host() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Target IP is required",
                "success": false,
                "responseTime": 0
            })),
        )
            .into_response();
    };

    tracing::info!("Testing connectivity for {}", host);
    match state.local_prober.ping(host).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => {
            tracing::error!("Connectivity test for {} failed: {}", host, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": e.to_string(),
                    "success": false,
                    "responseTime": 0
                })),
            )
                .into_response()
        }
    }
}
