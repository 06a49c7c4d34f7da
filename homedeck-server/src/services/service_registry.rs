//! Service registry
//!
//! A JSON file listing the self-hosted services shown on the dashboard.
//! Every listing re-checks each service's reachability; the stored status is
//! only the one observed when the entry was added.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reachability check timeout
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Service with this URL already exists.")]
    DuplicateUrl,

    #[error("A service with this name already exists.")]
    DuplicateName,

    #[error("Missing required fields: name, url, icon.")]
    MissingFields,

    #[error("Service not found.")]
    NotFound,

    #[error("Registry file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Reachability of a registered service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Online,
    #[default]
    Offline,
}

/// One registered service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub icon: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub status: ServiceStatus,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Registration request; missing fields are reported together
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewService {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// File-backed service registry
pub struct ServiceRegistry {
    path: PathBuf,
    http_client: reqwest::Client,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl ServiceRegistry {
    pub fn new(path: PathBuf) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .timeout(STATUS_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            path,
            http_client,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All registered services with freshly checked status
    pub async fn list(&self) -> Result<Vec<ServiceEntry>, RegistryError> {
        let services = self.load().await?;

        let checks = services.iter().map(|s| self.check_status(&s.url));
        let statuses = join_all(checks).await;

        Ok(services
            .into_iter()
            .zip(statuses)
            .map(|(service, status)| ServiceEntry { status, ..service })
            .collect())
    }

    /// Register a new service
    pub async fn add(&self, request: NewService) -> Result<ServiceEntry, RegistryError> {
        let (name, url, icon) = match (
            non_empty(request.name),
            non_empty(request.url),
            non_empty(request.icon),
        ) {
            (Some(name), Some(url), Some(icon)) => (name, url, icon),
            _ => return Err(RegistryError::MissingFields),
        };

        let _guard = self.write_lock.lock().await;
        let mut services = self.load().await?;

        if services.iter().any(|s| s.url == url) {
            return Err(RegistryError::DuplicateUrl);
        }
        let lowered = name.to_lowercase();
        if services.iter().any(|s| s.name.to_lowercase() == lowered) {
            return Err(RegistryError::DuplicateName);
        }

        let status = self.check_status(&url).await;
        let entry = ServiceEntry {
            name,
            description: non_empty(request.description).unwrap_or_default(),
            url,
            icon,
            category: non_empty(request.category).unwrap_or_else(default_category),
            status,
        };

        services.push(entry.clone());
        self.save(&services).await?;
        info!(name = %entry.name, url = %entry.url, "Registered service");
        Ok(entry)
    }

    /// Remove the service with exactly this name
    pub async fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock().await;
        let mut services = self.load().await?;

        let before = services.len();
        services.retain(|s| s.name != name);
        if services.len() == before {
            return Err(RegistryError::NotFound);
        }

        self.save(&services).await?;
        info!(name = %name, "Removed service");
        Ok(())
    }

    /// HEAD the service; any failure or non-2xx status is offline
    async fn check_status(&self, url: &str) -> ServiceStatus {
        match self.http_client.head(url).send().await {
            Ok(response) if response.status().is_success() => ServiceStatus::Online,
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "Service responded with error status");
                ServiceStatus::Offline
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Service unreachable");
                ServiceStatus::Offline
            }
        }
    }

    async fn load(&self) -> Result<Vec<ServiceEntry>, RegistryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read service registry");
                Err(e.into())
            }
        }
    }

    async fn save(&self, services: &[ServiceEntry]) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(services)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Nothing listens on port 1; status checks fail fast and report offline
    const UNREACHABLE: &str = "http://127.0.0.1:1/";

    fn registry(temp_dir: &TempDir) -> ServiceRegistry {
        ServiceRegistry::new(temp_dir.path().join("data").join("services.json")).unwrap()
    }

    fn request(name: &str, url: &str) -> NewService {
        NewService {
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            icon: Some("jellyfin.svg".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_lists_empty() {
        let temp_dir = TempDir::new().unwrap();
        let services = registry(&temp_dir).list().await.unwrap();
        assert!(services.is_empty());
    }

    #[tokio::test]
    async fn test_add_fills_defaults_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let entry = registry.add(request("Jellyfin", UNREACHABLE)).await.unwrap();
        assert_eq!(entry.description, "");
        assert_eq!(entry.category, "Uncategorized");
        assert_eq!(entry.status, ServiceStatus::Offline);

        let on_disk = std::fs::read_to_string(registry.path()).unwrap();
        let stored: Vec<ServiceEntry> = serde_json::from_str(&on_disk).unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test]
    async fn test_missing_required_fields_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let mut no_icon = request("Jellyfin", UNREACHABLE);
        no_icon.icon = None;
        assert!(matches!(
            registry.add(no_icon).await,
            Err(RegistryError::MissingFields)
        ));

        let blank_name = request("  ", UNREACHABLE);
        assert!(matches!(
            registry.add(blank_name).await,
            Err(RegistryError::MissingFields)
        ));
        assert!(!registry.path().exists());
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);
        registry.add(request("Jellyfin", UNREACHABLE)).await.unwrap();

        assert!(matches!(
            registry.add(request("Other", UNREACHABLE)).await,
            Err(RegistryError::DuplicateUrl)
        ));
        assert!(matches!(
            registry.add(request("JELLYFIN", "http://127.0.0.1:1/other")).await,
            Err(RegistryError::DuplicateName)
        ));
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_by_exact_name() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);
        registry.add(request("Jellyfin", UNREACHABLE)).await.unwrap();

        assert!(matches!(
            registry.remove("jellyfin").await,
            Err(RegistryError::NotFound)
        ));
        registry.remove("Jellyfin").await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);
        std::fs::create_dir_all(registry.path().parent().unwrap()).unwrap();
        std::fs::write(registry.path(), "{ not json").unwrap();

        assert!(matches!(registry.list().await, Err(RegistryError::Parse(_))));
    }

    #[test]
    fn test_stored_entries_without_optional_fields_load() {
        let entries: Vec<ServiceEntry> =
            serde_json::from_str(r#"[{"name":"Pi-hole","url":"http://pi.hole","icon":"pihole.png"}]"#)
                .unwrap();
        assert_eq!(entries[0].category, "Uncategorized");
        assert_eq!(entries[0].status, ServiceStatus::Offline);
    }
}
