//! Host statistics sampling
//!
//! CPU, RAM, disk and temperature as whole-number percentages (temperature
//! in °C). Sampling blocks for the CPU measurement interval, so it runs on
//! the blocking thread pool.

use serde::Serialize;
use std::path::Path;
use sysinfo::{Components, Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use thiserror::Error;

/// Reported when the host exposes no temperature sensor
const DEFAULT_TEMPERATURE: u32 = 25;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Statistics sampling task failed: {0}")]
    Sampler(#[from] tokio::task::JoinError),
}

/// One sample of host statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub cpu: u32,
    pub ram: u32,
    pub disk: u32,
    pub temp: u32,
}

/// Host statistics sampler
#[derive(Debug, Clone)]
pub struct HostStats {
    disk_path: String,
}

impl HostStats {
    /// `disk_path` is the mount point whose usage is reported as `disk`
    pub fn new(disk_path: impl Into<String>) -> Self {
        Self {
            disk_path: disk_path.into(),
        }
    }

    pub async fn sample(&self) -> Result<HostSnapshot, StatsError> {
        let disk_path = self.disk_path.clone();
        let snapshot = tokio::task::spawn_blocking(move || sample_blocking(&disk_path)).await?;
        Ok(snapshot)
    }
}

fn sample_blocking(disk_path: &str) -> HostSnapshot {
    let mut system = System::new();

    // CPU usage is a delta between two refreshes
    system.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    let cpu = system.global_cpu_usage().round().clamp(0.0, 100.0) as u32;

    system.refresh_memory();
    let ram = percent(system.used_memory(), system.total_memory());

    let disks = Disks::new_with_refreshed_list();
    let mut disk_info = disks
        .list()
        .iter()
        .find(|d| mount_matches(d.mount_point(), disk_path, false));
    if disk_info.is_none() && cfg!(target_os = "windows") {
        disk_info = disks
            .list()
            .iter()
            .find(|d| mount_matches(d.mount_point(), disk_path, true));
    }
    let disk = disk_info
        .map(|d| {
            let total = d.total_space();
            percent(total.saturating_sub(d.available_space()), total)
        })
        .unwrap_or(0);

    let components = Components::new_with_refreshed_list();
    let temp = components
        .list()
        .iter()
        .filter_map(|c| c.temperature())
        .filter(|t| t.is_finite())
        .fold(None, |max: Option<f32>, t| Some(max.map_or(t, |m| m.max(t))))
        .map(|t| t.round().max(0.0) as u32)
        .unwrap_or(DEFAULT_TEMPERATURE);

    HostSnapshot {
        cpu,
        ram,
        disk,
        temp,
    }
}

/// `used / total` as a rounded percentage; 0 when `total` is 0
fn percent(used: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((used as f64 / total as f64) * 100.0).round().min(100.0) as u32
}

/// Exact mount match, or a case-insensitive prefix match (drive letters)
fn mount_matches(mount: &Path, wanted: &str, prefix: bool) -> bool {
    let mount = mount.to_string_lossy();
    if prefix {
        mount.to_uppercase().starts_with(&wanted.to_uppercase())
    } else {
        mount == wanted
    }
}
