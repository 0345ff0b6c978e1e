//! Error types for island-core.

use thiserror::Error;

/// Result type alias for island-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while driving the volume manager or jail host.
#[derive(Debug, Error)]
pub enum CoreError {
    /// External tool could not be started or exited non-zero.
    ///
    /// `message` is the tool's own diagnostic, unmodified.
    #[error("{command} failed{}: {message}", exit_suffix(.code))]
    Invocation {
        /// Program and arguments as invoked
        command: String,
        /// Exit code, `None` if the process never ran or was killed by a signal
        code: Option<i32>,
        /// Diagnostic reported by the tool
        message: String,
    },

    /// External tool did not finish within the configured bound
    #[error("{command} timed out after {after:?}")]
    Timeout {
        /// Program and arguments as invoked
        command: String,
        /// Configured timeout
        after: std::time::Duration,
    },

    /// Jail listing output did not have the expected shape
    #[error("unparseable jail listing at line {line}: {reason}")]
    Parse {
        /// 1-based line number in the tool output
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// No running jail has the requested id
    #[error("jail not found: {0}")]
    NotFound(u32),

    /// Instance identifier cannot name a dataset under the jails root
    #[error("invalid instance id: {0:?}")]
    InvalidInstanceId(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

impl CoreError {
    /// Whether this error came from the external tool rather than from
    /// validation or parsing in this crate.
    pub fn is_invocation(&self) -> bool {
        matches!(self, Self::Invocation { .. } | Self::Timeout { .. })
    }
}
