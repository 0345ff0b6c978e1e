//! IslandServer - shared handle to the dataset and jail services.

use crate::config::IslandConfig;
use island_core::{CommandRunner, DatasetManager, JailService, SystemRunner};
use std::sync::Arc;

/// Services backing the HTTP API.
///
/// Cheap to clone; all clones share the same services.
#[derive(Clone)]
pub struct IslandServer {
    /// Dataset lifecycle manager from island-core
    datasets: Arc<DatasetManager>,

    /// Jail listing and control from island-core
    jails: Arc<JailService>,

    /// Configuration
    config: IslandConfig,
}

impl IslandServer {
    /// Create a server that runs the configured tools on this host.
    pub fn new(config: IslandConfig) -> Self {
        let runner = Arc::new(SystemRunner::new(config.tools.timeout));
        Self::with_runner(config, runner)
    }

    /// Create a server on top of an arbitrary command runner.
    pub fn with_runner(config: IslandConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let datasets = DatasetManager::new(
            config.dataset.clone(),
            &config.tools.zfs_path,
            Arc::clone(&runner),
        );
        let jails = JailService::new(&config.tools.jls_path, &config.tools.jail_path, runner);

        tracing::info!(
            pool = %config.dataset.pool,
            release = %config.dataset.release,
            "Island services configured"
        );

        Self {
            datasets: Arc::new(datasets),
            jails: Arc::new(jails),
            config,
        }
    }

    /// Get a reference to the dataset manager.
    pub fn datasets(&self) -> &DatasetManager {
        &self.datasets
    }

    /// Get a reference to the jail service.
    pub fn jails(&self) -> &JailService {
        &self.jails
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &IslandConfig {
        &self.config
    }

    /// Create the base jail dataset and the release dataset.
    ///
    /// Failures are logged and skipped: on an already provisioned host both
    /// datasets exist and `zfs` refuses to create the base again.
    pub async fn bootstrap(&self) {
        tracing::info!("Bootstrapping jail datasets");

        if let Err(e) = self.datasets.create_base_jail_dataset().await {
            tracing::warn!(error = %e, "Base jail dataset not created");
        }

        match self.datasets.create_dataset().await {
            Ok(()) => tracing::info!(
                dataset = %self.datasets.release_dataset(),
                "Release dataset ready"
            ),
            Err(e) => tracing::error!(error = %e, "Release dataset not created"),
        }
    }
}
