//! # island-core
//!
//! Jail lifecycle orchestration for FreeBSD hosts.
//!
//! This crate drives two external tool families: `zfs` for the datasets that
//! back jail root filesystems, and `jls`/`jail` for the jails themselves.
//! It keeps no state of its own; every read goes back to the host.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    island-core                           │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌──────────────────────┐   ┌─────────────────────────┐  │
//! │  │ DatasetManager       │   │ JailService             │  │
//! │  │ - create_dataset()   │   │ - list_running()        │  │
//! │  │ - create_snapshot()  │   │ - details()             │  │
//! │  │ - clone_base_to_jail │   │ - kill()                │  │
//! │  │ - remove_dataset()   │   │ - kill_all()            │  │
//! │  └──────────┬───────────┘   └────────────┬────────────┘  │
//! │             └──────────────┬─────────────┘               │
//! │                            ▼                             │
//! │               ┌─────────────────────────┐                │
//! │               │ dyn CommandRunner       │                │
//! │               │ (SystemRunner: timeout, │                │
//! │               │  kill on drop)          │                │
//! │               └────────────┬────────────┘                │
//! └────────────────────────────┼─────────────────────────────┘
//!                              ▼
//!                   zfs / jls / jail on the host
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use island_core::{DatasetConfig, DatasetManager, JailService, RunnerConfig, SystemRunner};
//! use std::sync::Arc;
//!
//! # async fn example() -> island_core::Result<()> {
//! let tools = RunnerConfig::default();
//! let runner = Arc::new(SystemRunner::new(tools.timeout));
//!
//! let datasets = DatasetManager::new(
//!     DatasetConfig::builder().pool("zroot").release("12.1-RELEASE").build()?,
//!     &tools.zfs_path,
//!     runner.clone(),
//! );
//! datasets.create_dataset().await?;
//! // ... populate the release dataset ...
//! datasets.create_snapshot().await?;
//! datasets.clone_base_to_jail("web1").await?;
//!
//! let jails = JailService::new(&tools.jls_path, &tools.jail_path, runner);
//! for jail in jails.list_running().await? {
//!     println!("{} {}", jail.jid, jail.name);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod dataset;
mod error;
mod jail;
mod runner;

pub use config::{DatasetConfig, DatasetConfigBuilder, RunnerConfig, RELEASE_SNAPSHOT};
pub use dataset::{DatasetManager, InstanceId};
pub use error::{CoreError, Result};
pub use jail::{parse_jls, JailRecord, JailService, KillAllReport, KillFailure, JLS_PARAMS};
pub use runner::{CommandRunner, SystemRunner};
