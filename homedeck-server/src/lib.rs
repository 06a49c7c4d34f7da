//! homedeck-server library interface
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use homedeck_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::services::host_stats::HostStats;
use crate::services::job_controller::JobController;
use crate::services::service_registry::{RegistryError, ServiceRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<ServerConfig>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Acquisition job slot
    pub jobs: JobController,
    /// Dashboard service registry
    pub services: Arc<ServiceRegistry>,
    /// Host statistics sampler
    pub host_stats: HostStats,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, event_bus: EventBus) -> Result<Self, RegistryError> {
        let jobs = JobController::new(config.job_controller_config(), event_bus.clone());
        let services = ServiceRegistry::new(config.services_file.clone())?;
        let host_stats = HostStats::new(config.disk_path.clone());

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            jobs,
            services: Arc::new(services),
            host_stats,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::job_routes())
        .merge(api::file_routes())
        .merge(api::media_routes())
        .merge(api::service_routes())
        .merge(api::stats_routes())
        .merge(api::health_routes())
        .merge(api::buildinfo_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
