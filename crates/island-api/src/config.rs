//! Configuration for the API server.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use island_core::{CoreError, DatasetConfig, RunnerConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 3280;

/// Configuration for the island API server.
#[derive(Debug, Clone)]
pub struct IslandConfig {
    /// Pool, release and base jail directory.
    pub dataset: DatasetConfig,

    /// External tool paths and invocation timeout.
    pub tools: RunnerConfig,

    /// Create the base and release datasets at startup (default: false).
    pub bootstrap: bool,

    /// HTTP server bind address.
    pub http_addr: SocketAddr,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("tool not found: {0}")]
    MissingTool(PathBuf),
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            tools: RunnerConfig::default(),
            bootstrap: false,
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), DEFAULT_HTTP_PORT),
        }
    }
}

impl IslandConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `ISLAND_ZFS_DATASET` | `zroot` |
    /// | `ISLAND_RELEASE` | `12.1-RELEASE` |
    /// | `ISLAND_BASE_JAIL_DIR` | `/zroot/jails/base` |
    /// | `ISLAND_ZFS_PATH` | `zfs` |
    /// | `ISLAND_JLS_PATH` | `jls` |
    /// | `ISLAND_JAIL_PATH` | `jail` |
    /// | `ISLAND_COMMAND_TIMEOUT_SECS` | `30` |
    /// | `ISLAND_BOOTSTRAP` | `false` |
    /// | `ISLAND_HTTP_HOST` | `0.0.0.0` |
    /// | `ISLAND_HTTP_PORT` | `3280` |
    pub fn from_env() -> Self {
        let default = Self::default();

        let http_host: IpAddr = std::env::var("ISLAND_HTTP_HOST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.ip());

        let http_port: u16 = std::env::var("ISLAND_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);

        let dataset = DatasetConfig {
            pool: std::env::var("ISLAND_ZFS_DATASET").unwrap_or(default.dataset.pool),
            release: std::env::var("ISLAND_RELEASE").unwrap_or(default.dataset.release),
            base_jail_dir: std::env::var("ISLAND_BASE_JAIL_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.dataset.base_jail_dir),
        };

        let tools = RunnerConfig {
            zfs_path: std::env::var("ISLAND_ZFS_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.tools.zfs_path),
            jls_path: std::env::var("ISLAND_JLS_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.tools.jls_path),
            jail_path: std::env::var("ISLAND_JAIL_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.tools.jail_path),
            timeout: std::env::var("ISLAND_COMMAND_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.tools.timeout),
        };

        Self {
            dataset,
            tools,
            bootstrap: std::env::var("ISLAND_BOOTSTRAP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(default.bootstrap),
            http_addr: SocketAddr::new(http_host, http_port),
        }
    }

    /// Validate dataset naming and tool settings.
    ///
    /// Tools given as absolute paths must exist; bare names are resolved
    /// through `PATH` when invoked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dataset.validate()?;
        self.tools.validate()?;

        for tool in [
            &self.tools.zfs_path,
            &self.tools.jls_path,
            &self.tools.jail_path,
        ] {
            if tool.is_absolute() && !tool.exists() {
                return Err(ConfigError::MissingTool(tool.clone()));
            }
        }

        Ok(())
    }

    /// Warn about tools that cannot be found instead of failing.
    ///
    /// Use this for development hosts that are not running FreeBSD.
    pub fn validate_warn(&self) {
        for tool in [
            &self.tools.zfs_path,
            &self.tools.jls_path,
            &self.tools.jail_path,
        ] {
            if tool.is_absolute() && !tool.exists() {
                tracing::warn!("Tool not found: {:?}", tool);
            }
        }
    }
}
