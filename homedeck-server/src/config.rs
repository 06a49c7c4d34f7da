//! Server configuration
//!
//! Command-line arguments and environment variables override the TOML
//! bootstrap file, which overrides built-in defaults.

use clap::Parser;
use homedeck_common::config::{default_services_file, TomlConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::job_controller::JobControllerConfig;
use crate::services::path_sandbox;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3001;

/// Default EventBus capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Command-line arguments for homedeck-server
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "homedeck-server")]
#[command(about = "Self-hosted home server console")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "HOMEDECK_PORT")]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "HOMEDECK_BIND")]
    pub bind: Option<IpAddr>,

    /// Root directory for acquired media and the music catalog
    #[arg(long, env = "HOMEDECK_MEDIA_ROOT")]
    pub media_root: Option<PathBuf>,

    /// Root directory exposed by the file browser
    #[arg(long, env = "HOMEDECK_BROWSE_ROOT")]
    pub browse_root: Option<PathBuf>,

    /// JSON file backing the service registry
    #[arg(long, env = "HOMEDECK_SERVICES_FILE")]
    pub services_file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "HOMEDECK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub media_root: Option<PathBuf>,
    pub browse_root: Option<PathBuf>,
    pub services_file: PathBuf,
    pub event_capacity: usize,
    pub acquisition_program: String,
    pub acquisition_args: Vec<String>,
    pub acquisition_timeout: Option<Duration>,
    pub disk_path: String,
    pub log_level: String,
}

impl ServerConfig {
    /// Merge command-line arguments over the TOML config
    ///
    /// Relative roots are made absolute against the working directory, and
    /// `.`/`..` segments are folded away.
    pub fn resolve(args: &Args, toml: TomlConfig) -> homedeck_common::Result<Self> {
        let bind = match (args.bind, toml.bind.as_deref()) {
            (Some(addr), _) => addr,
            (None, Some(text)) => text.parse().map_err(|e| {
                homedeck_common::Error::Config(format!("Invalid bind address {:?}: {}", text, e))
            })?,
            (None, None) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let media_root = args
            .media_root
            .clone()
            .or(toml.media_root)
            .map(|p| absolutize(&p))
            .transpose()?;
        let browse_root = args
            .browse_root
            .clone()
            .or(toml.browse_root)
            .map(|p| absolutize(&p))
            .transpose()?;

        let services_file = args
            .services_file
            .clone()
            .or(toml.services_file)
            .unwrap_or_else(default_services_file);

        Ok(Self {
            listen_addr: SocketAddr::new(bind, port),
            media_root,
            browse_root,
            services_file,
            event_capacity: toml.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY).max(1),
            acquisition_program: toml.acquisition.program,
            acquisition_args: toml.acquisition.args,
            acquisition_timeout: toml
                .acquisition
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            disk_path: toml.stats.disk_path,
            log_level: toml.logging.level,
        })
    }

    /// Invocation settings for the acquisition job controller
    pub fn job_controller_config(&self) -> JobControllerConfig {
        JobControllerConfig {
            program: self.acquisition_program.clone(),
            args: self.acquisition_args.clone(),
            output_root: self.media_root.clone(),
            timeout: self.acquisition_timeout,
        }
    }

    /// Configuration for tests: everything default except the given roots
    pub fn with_roots(media_root: Option<PathBuf>, browse_root: Option<PathBuf>) -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            media_root,
            browse_root,
            services_file: default_services_file(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            acquisition_program: "spotdl".to_string(),
            acquisition_args: Vec::new(),
            acquisition_timeout: None,
            disk_path: "/".to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn absolutize(path: &Path) -> homedeck_common::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path_sandbox::normalize(path))
    } else {
        Ok(path_sandbox::normalize(&std::env::current_dir()?.join(path)))
    }
}
