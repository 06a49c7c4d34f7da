//! File browser API handlers
//!
//! GET /files/browse, GET /files/download
//!
//! Every path is resolved inside the configured browse root; a path that
//! escapes it is answered with 403 and never touched.

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderValue},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::serve::{configured_root, resolve_required, serve_resolved_file};
use crate::error::{ApiError, ApiResult};
use crate::services::directory_indexer::{self, DirectoryEntry, EntryKind};
use crate::services::path_sandbox;
use crate::AppState;

/// `?path=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

/// One entry of a browse listing
#[derive(Debug, Serialize)]
pub struct BrowseEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Last modification date, `YYYY-MM-DD`
    pub modified: String,
    /// Path to request this entry with, relative to the browse root
    pub path: String,
}

impl From<DirectoryEntry> for BrowseEntry {
    fn from(entry: DirectoryEntry) -> Self {
        Self {
            size: entry.size_bytes.map(format_size),
            size_bytes: entry.size_bytes,
            modified: entry.modified.format("%Y-%m-%d").to_string(),
            path: format!("/{}", entry.relative_path),
            name: entry.name,
            kind: entry.kind,
        }
    }
}

/// GET /files/browse?path=<rel>
///
/// Lists one directory level, sorted by name. `path` defaults to the root.
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Vec<BrowseEntry>>> {
    let root = configured_root(state.config.browse_root.as_ref(), "browse root")?;
    let root = path_sandbox::normalize(root);
    let dir = path_sandbox::resolve(&root, query.path.as_deref().unwrap_or("/"))?;

    let entries = tokio::task::spawn_blocking(move || directory_indexer::list_entries(&root, &dir))
        .await
        .map_err(|e| ApiError::Internal(format!("Directory listing task failed: {}", e)))??;

    Ok(Json(entries.into_iter().map(BrowseEntry::from).collect()))
}

/// GET /files/download?path=<rel>
///
/// Streams the file as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    request: Request,
) -> ApiResult<Response> {
    let root = configured_root(state.config.browse_root.as_ref(), "browse root")?;
    let file = resolve_required(root, query.path.as_deref())?;

    let mut response = serve_resolved_file(&file, request).await?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&file_name)) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/files/browse", get(browse))
        .route("/files/download", get(download))
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }

    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[exponent])
}

/// `attachment` disposition with an ASCII fallback name and the UTF-8 name
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(file_name.len());
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024 + 1024 * 1024 * 1024 / 4), "5.25 GB");
    }

    #[test]
    fn test_content_disposition_plain_name() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        let value = content_disposition("my \"best\" café.mp3");
        assert!(value.starts_with("attachment; filename=\"my _best_ caf_.mp3\""));
        assert!(value.ends_with("filename*=UTF-8''my%20%22best%22%20caf%C3%A9.mp3"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
