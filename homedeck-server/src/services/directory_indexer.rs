//! Directory listing and media catalog scanning
//!
//! Two walks over already-sandboxed paths:
//! - [`list_entries`]: one directory level for the file browser
//! - [`scan_media_root`]: full recursive walk of the media root, producing
//!   one [`MediaEntry`] per audio file
//!
//! Both are blocking; async callers run them on the blocking thread pool.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

use super::path_sandbox::relative_display;

/// Audio file extensions included in the media catalog (matched case-insensitively)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "ogg", "wav"];

/// Artist reported for files less than two directories deep
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Album reported for files directly in the media root
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Directory indexing errors
#[derive(Debug, Error)]
pub enum IndexError {
    /// Directory does not exist
    #[error("Directory not found: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Any other filesystem failure
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IndexError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            IndexError::NotFound(path.to_path_buf())
        } else {
            IndexError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// File or folder name
    pub name: String,
    /// File or folder
    pub kind: EntryKind,
    /// Size in bytes (files only)
    pub size_bytes: Option<u64>,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Path relative to the listing root, `/`-separated
    pub relative_path: String,
}

/// One playable file in the media catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaEntry {
    /// Path relative to the media root, `/`-separated
    #[serde(rename = "path")]
    pub relative_path: String,
    /// File name without extension
    pub title: String,
    /// Grandparent directory name
    pub artist: String,
    /// Parent directory name
    pub album: String,
}

/// List one level of `dir`, sorted by name
///
/// `root` is only used to compute each entry's relative path and must be
/// normalized the same way `dir` was resolved. Entries whose target cannot
/// be stat'ed (dangling symlinks) are described by the link's own metadata;
/// entries removed while listing are skipped.
pub fn list_entries(root: &Path, dir: &Path) -> Result<Vec<DirectoryEntry>, IndexError> {
    let metadata = fs::metadata(dir).map_err(|e| IndexError::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(IndexError::NotADirectory(dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| IndexError::io(dir, e))? {
        let entry = entry.map_err(|e| IndexError::io(dir, e))?;
        let path = entry.path();
        let Some(metadata) = entry_metadata(&path, || entry.metadata())? else {
            tracing::debug!("Entry vanished during listing: {}", path.display());
            continue;
        };

        let kind = if metadata.is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::File
        };

        entries.push(DirectoryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
            size_bytes: metadata.is_file().then(|| metadata.len()),
            modified: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH)),
            relative_path: relative_display(root, &path),
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Metadata of a listed entry, following symlinks when possible
///
/// Falls back to `link_metadata` for dangling links. `None` when the entry
/// no longer exists at all.
fn entry_metadata(
    path: &Path,
    link_metadata: impl FnOnce() -> io::Result<fs::Metadata>,
) -> Result<Option<fs::Metadata>, IndexError> {
    match fs::metadata(path).or_else(|_| link_metadata()) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Walk the media root and catalog every audio file
///
/// A missing root is created and yields an empty catalog, so a fresh
/// install works before the first acquisition job has run. Failure to read
/// the root itself is an error; unreadable subdirectories are logged and
/// skipped.
pub fn scan_media_root(root: &Path) -> Result<Vec<MediaEntry>, IndexError> {
    match fs::metadata(root) {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(IndexError::NotADirectory(root.to_path_buf()));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!("Media root not found, creating it: {}", root.display());
            fs::create_dir_all(root).map_err(|e| IndexError::Io {
                path: root.to_path_buf(),
                source: e,
            })?;
            return Ok(Vec::new());
        }
        Err(e) => return Err(IndexError::io(root, e)),
    }

    let mut catalog = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(IndexError::Io {
                    path: root.to_path_buf(),
                    source: io::Error::from(e),
                });
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable media entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_audio_file(entry.path()) {
            if let Some(media) = media_entry(root, entry.path()) {
                catalog.push(media);
            }
        }
    }

    tracing::debug!("Media scan complete: {} tracks under {}", catalog.len(), root.display());
    Ok(catalog)
}

/// Check the extension against [`AUDIO_EXTENSIONS`]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Infer title/artist/album from the file's position under `root`
fn media_entry(root: &Path, path: &Path) -> Option<MediaEntry> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let depth = parts.len();
    let title = path.file_stem()?.to_string_lossy().into_owned();
    let artist = if depth > 2 {
        parts[depth - 3].clone()
    } else {
        UNKNOWN_ARTIST.to_string()
    };
    let album = if depth > 1 {
        parts[depth - 2].clone()
    } else {
        UNKNOWN_ALBUM.to_string()
    };

    Some(MediaEntry {
        relative_path: parts.join("/"),
        title,
        artist,
        album,
    })
}
