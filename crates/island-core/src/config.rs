//! Dataset and command runner configuration types.

use crate::error::CoreError;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the snapshot every instance clone is taken from.
pub const RELEASE_SNAPSHOT: &str = "p1";

/// Where the jail datasets live and which release they are built from.
///
/// Immutable once built; [`DatasetManager`](crate::DatasetManager) derives
/// every dataset name from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Root dataset, e.g. `zroot`.
    pub pool: String,
    /// Release identifier, e.g. `12.1-RELEASE`.
    pub release: String,
    /// Mountpoint of the base jail dataset.
    pub base_jail_dir: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            pool: "zroot".into(),
            release: "12.1-RELEASE".into(),
            base_jail_dir: PathBuf::from("/zroot/jails/base"),
        }
    }
}

impl DatasetConfig {
    /// Create a new config builder.
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.pool.is_empty() {
            return Err(CoreError::Config("pool is required".into()));
        }
        if self.pool.starts_with(&['/', '-'][..])
            || self.pool.ends_with('/')
            || self.pool.contains(&['@', '#'][..])
        {
            return Err(CoreError::Config(format!(
                "pool is not a dataset name: {}",
                self.pool
            )));
        }
        if self.release.is_empty() {
            return Err(CoreError::Config("release is required".into()));
        }
        if self.release.contains(&['/', '@', '#'][..]) {
            return Err(CoreError::Config(format!(
                "release must be a single dataset component: {}",
                self.release
            )));
        }
        if !self.base_jail_dir.is_absolute() {
            return Err(CoreError::Config(format!(
                "base_jail_dir must be absolute: {}",
                self.base_jail_dir.display()
            )));
        }
        Ok(())
    }
}

/// Builder for DatasetConfig.
#[derive(Debug, Default)]
pub struct DatasetConfigBuilder {
    config: DatasetConfig,
}

impl DatasetConfigBuilder {
    /// Set the root dataset.
    pub fn pool(mut self, pool: impl Into<String>) -> Self {
        self.config.pool = pool.into();
        self
    }

    /// Set the release identifier.
    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.config.release = release.into();
        self
    }

    /// Set the base jail mountpoint.
    pub fn base_jail_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_jail_dir = path.into();
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<DatasetConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// External tool locations and the per-invocation time bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Path to the `zfs` binary (default: `zfs`, resolved via `PATH`).
    pub zfs_path: PathBuf,
    /// Path to the `jls` binary.
    pub jls_path: PathBuf,
    /// Path to the `jail` binary.
    pub jail_path: PathBuf,
    /// Maximum run time of any single invocation (default: 30s).
    pub timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            zfs_path: PathBuf::from("zfs"),
            jls_path: PathBuf::from("jls"),
            jail_path: PathBuf::from("jail"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RunnerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, path) in [
            ("zfs_path", &self.zfs_path),
            ("jls_path", &self.jls_path),
            ("jail_path", &self.jail_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(CoreError::Config(format!("{name} is required")));
            }
        }
        if self.timeout.is_zero() {
            return Err(CoreError::Config("timeout must be > 0".into()));
        }
        Ok(())
    }
}
