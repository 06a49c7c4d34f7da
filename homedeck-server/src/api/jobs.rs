//! Acquisition job API handlers
//!
//! POST /jobs, GET /jobs/current

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::services::job_controller::JobSnapshot;
use crate::{ApiResult, AppState};

/// POST /jobs request
#[derive(Debug, Default, Deserialize)]
pub struct StartJobRequest {
    /// Catalog URL of a playlist, track or album
    #[serde(default, alias = "playlistUrl")]
    pub target: String,
}

/// POST /jobs response
#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub message: String,
    pub job: JobSnapshot,
}

/// GET /jobs/current response
#[derive(Debug, Serialize)]
pub struct CurrentJobResponse {
    pub job: JobSnapshot,
}

/// POST /jobs
///
/// Accepts the job and returns 202 immediately; progress and outcome are
/// delivered on the `/events` push channel. A body that is missing or not
/// JSON is treated as an invalid target.
pub async fn start_job(
    State(state): State<AppState>,
    request: Option<Json<StartJobRequest>>,
) -> ApiResult<(StatusCode, Json<StartJobResponse>)> {
    let Json(request) = request.unwrap_or_default();
    let job = state.jobs.start(request.target.trim()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartJobResponse {
            message: "Acquisition process started.".to_string(),
            job,
        }),
    ))
}

/// GET /jobs/current
pub async fn current_job(State(state): State<AppState>) -> Json<CurrentJobResponse> {
    Json(CurrentJobResponse {
        job: state.jobs.current().await,
    })
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(start_job))
        .route("/jobs/current", get(current_job))
}
