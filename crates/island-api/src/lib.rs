//! # island-api
//!
//! HTTP API exposing running jails on a FreeBSD host.
//!
//! ## Quick Start
//!
//! Run the server with default configuration:
//!
//! ```bash
//! cargo run -p island-api
//! ```
//!
//! Configure via environment variables:
//!
//! ```bash
//! export ISLAND_ZFS_DATASET=zroot
//! export ISLAND_RELEASE=12.1-RELEASE
//! export ISLAND_BASE_JAIL_DIR=/zroot/jails/base
//! export ISLAND_BOOTSTRAP=true
//! cargo run -p island-api
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET` | `/api/v1/jails` | `{"jails": [...]}` |
//! | `GET` | `/api/v1/jails/:id` | `{"details": {...}}` |
//! | `DELETE` | `/api/v1/jails/:id` | `{"deleted": id}` |
//! | `DELETE` | `/api/v1/jails` | `{"deleted": [ids]}` |
//! | `GET` | `/health` | `{"status": "healthy"}` |

mod config;
pub mod http;
mod server;
mod types;

pub use config::{ConfigError, IslandConfig, DEFAULT_HTTP_PORT};
pub use server::IslandServer;
pub use types::*;
