//! ZFS dataset hierarchy backing jail root filesystems.
//!
//! ```text
//! <pool>                                  mounted at base_jail_dir
//! └── jails
//!     ├── releases
//!     │   └── <release>@p1                populated once, then snapshotted
//!     └── <instance-id>                   clone of <release>@p1
//! ```
//!
//! Names are derived from [`DatasetConfig`] on every call and never stored.
//! Ordering (create, populate, snapshot, clone) is the caller's job; running
//! it out of order surfaces as a `zfs` failure.

use crate::config::{DatasetConfig, RELEASE_SNAPSHOT};
use crate::error::{CoreError, Result};
use crate::runner::CommandRunner;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Child of `<pool>/jails` holding release datasets; never an instance id.
const RELEASES_DIR: &str = "releases";

/// Identifier of a jail instance, used as the leaf of its clone dataset.
///
/// Restricted to a single dataset component made of ASCII alphanumerics and
/// `_ - : .`, not starting with `-` or `.`, and never `releases`, which
/// would name the release hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    /// Validate and wrap an instance identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id != RELEASES_DIR
            && !id.starts_with(&['-', '.'][..])
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));
        if !valid {
            return Err(CoreError::InvalidInstanceId(id));
        }
        Ok(Self(id))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstanceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Creates, snapshots, clones and destroys jail datasets through `zfs`.
///
/// Every operation is a single `zfs` invocation; failures are returned as
/// reported by the tool, with no retry and no rollback.
pub struct DatasetManager {
    config: DatasetConfig,
    zfs_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl DatasetManager {
    /// Create a dataset manager.
    ///
    /// # Arguments
    ///
    /// * `config` - Pool, release and base jail directory
    /// * `zfs_path` - Path to the `zfs` binary
    /// * `runner` - Executes the `zfs` invocations
    pub fn new(
        config: DatasetConfig,
        zfs_path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let zfs_path = zfs_path.into();
        tracing::debug!(
            pool = %config.pool,
            release = %config.release,
            zfs = %zfs_path.display(),
            "Creating dataset manager"
        );
        Self {
            config,
            zfs_path,
            runner,
        }
    }

    /// Get the configuration the dataset names are derived from.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// `<pool>/jails/releases/<release>`
    pub fn release_dataset(&self) -> String {
        format!(
            "{}/jails/{}/{}",
            self.config.pool, RELEASES_DIR, self.config.release
        )
    }

    /// `<pool>/jails/releases/<release>@p1`
    pub fn release_snapshot(&self) -> String {
        format!("{}@{}", self.release_dataset(), RELEASE_SNAPSHOT)
    }

    /// `<pool>/jails/<instance-id>`
    pub fn instance_dataset(&self, instance_id: &InstanceId) -> String {
        format!("{}/jails/{}", self.config.pool, instance_id)
    }

    /// Create the base jail dataset, mounted at the configured base jail directory.
    pub async fn create_base_jail_dataset(&self) -> Result<()> {
        let mountpoint = format!("mountpoint={}", self.config.base_jail_dir.display());
        let pool = self.config.pool.as_str();
        self.zfs("create_base", pool, &["create", "-o", &mountpoint, pool])
            .await
    }

    /// Create the release dataset, including any missing parents.
    pub async fn create_dataset(&self) -> Result<()> {
        let dataset = self.release_dataset();
        self.zfs("create_release", &dataset, &["create", "-p", &dataset])
            .await
    }

    /// Snapshot the populated release dataset as `@p1`.
    ///
    /// Fails with the `zfs` error if the release dataset does not exist.
    pub async fn create_snapshot(&self) -> Result<()> {
        let snapshot = self.release_snapshot();
        self.zfs("snapshot", &snapshot, &["snapshot", &snapshot])
            .await
    }

    /// Clone the release snapshot into a new dataset for `instance_id`.
    ///
    /// The snapshot must exist and the instance dataset must not; both
    /// conditions are checked by `zfs`, not here.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInstanceId`] without invoking `zfs` if the
    /// id cannot be a dataset component.
    pub async fn clone_base_to_jail(&self, instance_id: &str) -> Result<()> {
        let instance_id = InstanceId::new(instance_id)?;
        let snapshot = self.release_snapshot();
        let dataset = self.instance_dataset(&instance_id);
        self.zfs("clone", &dataset, &["clone", &snapshot, &dataset])
            .await
    }

    /// Recursively and forcibly destroy the dataset of `instance_id`.
    ///
    /// Any jail running from this dataset must already be stopped.
    pub async fn remove_dataset(&self, instance_id: &str) -> Result<()> {
        let instance_id = InstanceId::new(instance_id)?;
        let dataset = self.instance_dataset(&instance_id);
        self.zfs("destroy", &dataset, &["destroy", "-rf", &dataset])
            .await
    }

    async fn zfs(&self, op: &'static str, dataset: &str, args: &[&str]) -> Result<()> {
        let start = std::time::Instant::now();
        tracing::debug!(op, dataset = %dataset, "Running zfs");

        match self.runner.run(&self.zfs_path, args).await {
            Ok(_) => {
                tracing::info!(
                    op,
                    dataset = %dataset,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Dataset operation completed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(op, dataset = %dataset, error = %e, "Dataset operation failed");
                Err(e)
            }
        }
    }
}
