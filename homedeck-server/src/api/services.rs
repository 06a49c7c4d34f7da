//! Service registry API handlers
//!
//! GET /services, POST /services, DELETE /services/:name

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::services::service_registry::{NewService, ServiceEntry};
use crate::{ApiResult, AppState};

/// GET /services
///
/// All services with status freshly checked.
pub async fn list_services(State(state): State<AppState>) -> ApiResult<Json<Vec<ServiceEntry>>> {
    Ok(Json(state.services.list().await?))
}

/// POST /services
///
/// A body that is missing or not JSON reports the required fields.
pub async fn add_service(
    State(state): State<AppState>,
    request: Option<Json<NewService>>,
) -> ApiResult<(StatusCode, Json<ServiceEntry>)> {
    let Json(request) = request.unwrap_or_default();
    let entry = state.services.add(request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /services/:name
pub async fn delete_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.remove(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(add_service))
        .route("/services/:name", delete(delete_service))
}
