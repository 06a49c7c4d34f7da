//! Music library API handlers
//!
//! GET /media/catalog, GET /media/stream

use axum::{
    extract::{Query, Request, State},
    response::Response,
    routing::get,
    Json, Router,
};

use super::files::PathQuery;
use super::serve::{configured_root, resolve_required, serve_resolved_file};
use crate::error::{ApiError, ApiResult};
use crate::services::directory_indexer::{self, MediaEntry};
use crate::AppState;

/// GET /media/catalog
///
/// Every playable file under the media root, rescanned on each request.
/// A missing media root is created and yields an empty catalog.
pub async fn catalog(State(state): State<AppState>) -> ApiResult<Json<Vec<MediaEntry>>> {
    let root = configured_root(state.config.media_root.as_ref(), "media root")?.to_path_buf();

    let entries = tokio::task::spawn_blocking(move || directory_indexer::scan_media_root(&root))
        .await
        .map_err(|e| ApiError::Internal(format!("Media scan task failed: {}", e)))??;

    tracing::debug!(count = entries.len(), "Media catalog scanned");
    Ok(Json(entries))
}

/// GET /media/stream?path=<rel>
///
/// Serves one file from the media root; honours `Range` so players can seek.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    request: Request,
) -> ApiResult<Response> {
    let root = configured_root(state.config.media_root.as_ref(), "media root")?;
    let file = resolve_required(root, query.path.as_deref())?;
    serve_resolved_file(&file, request).await
}

pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/media/catalog", get(catalog))
        .route("/media/stream", get(stream))
}
