//! Helpers shared by the file and media handlers

use axum::{
    body::Body,
    extract::Request,
    response::Response,
};
use std::path::{Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{ApiError, ApiResult};
use crate::services::path_sandbox;

/// The configured root, or `Unconfigured` naming the setting
pub(crate) fn configured_root<'a>(root: Option<&'a PathBuf>, setting: &str) -> ApiResult<&'a Path> {
    root.map(PathBuf::as_path).ok_or_else(|| {
        tracing::error!("Request needs {} but it is not configured", setting);
        ApiError::Unconfigured(format!("Server is not configured with a {}", setting))
    })
}

/// Resolve a required `path` query parameter inside `root`
pub(crate) fn resolve_required(root: &Path, user_path: Option<&str>) -> ApiResult<PathBuf> {
    let user_path = user_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("File path is required".to_string()))?;
    Ok(path_sandbox::resolve(root, user_path)?)
}

/// Serve a regular file with Range and conditional request support
pub(crate) async fn serve_resolved_file(path: &Path, request: Request) -> ApiResult<Response> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    if metadata.is_dir() {
        return Err(ApiError::BadRequest("Path is a directory".to_string()));
    }

    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    Ok(response.map(Body::new))
}
