//! Host statistics endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::services::host_stats::HostSnapshot;
use crate::{ApiResult, AppState};

/// GET /stats
///
/// `{cpu, ram, disk, temp}`; sampling takes a fraction of a second for the
/// CPU measurement.
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<HostSnapshot>> {
    let snapshot = state.host_stats.sample().await?;
    Ok(Json(snapshot))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}
