//! Web server module.

mod handlers;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::monitor::Monitor;
use crate::probe::{Prober, TEST_CONNECTIVITY_PATH};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub monitor: Arc<Monitor>,
    /// Prober behind this server's own connectivity endpoint.
    pub local_prober: Arc<dyn Prober>,
}

/// Web server for towerwatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        store: Arc<Store>,
        monitor: Arc<Monitor>,
        local_prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                store,
                monitor,
                local_prober,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            // Tower registry
            .route(
                "/api/towers",
                get(handlers::handle_get_towers).post(handlers::handle_create_tower),
            )
            .route(
                "/api/towers/{id}",
                put(handlers::handle_update_tower).delete(handlers::handle_delete_tower),
            )
            // Feasibility
            .route("/api/feasibility", post(handlers::handle_feasibility))
            .route("/api/feasibility/nearest", get(handlers::handle_nearest_tower))
            // Monitoring
            .route("/api/towers/{id}/probe", post(handlers::handle_probe))
            .route(
                "/api/towers/{id}/burst",
                get(handlers::handle_get_burst).post(handlers::handle_start_burst),
            )
            .route("/api/towers/{id}/health", get(handlers::handle_health))
            .route(
                "/api/logs",
                get(handlers::handle_get_logs).post(handlers::handle_post_log),
            )
            .route("/api/flaps", get(handlers::handle_get_flaps))
            // Reachability endpoint for remote monitors
            .route(TEST_CONNECTIVITY_PATH, post(handlers::handle_test_connectivity))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
