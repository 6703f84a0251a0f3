//! Error types for bssidcast-core.
//!
//! Every failure in the scan/publish loop is caught where it happens and
//! turned into status text; none of them terminate the scheduler.
//!
//! | Error | Raised by | Effect on the scheduler |
//! |-------|-----------|-------------------------|
//! | [`Error::PermissionDenied`] | `start()` / `scan_once()` | Stays Idle |
//! | [`Error::ScanFailed`] | a scan tick | Reported, next tick proceeds |
//! | [`Error::ConnectFailure`] | `start()` | Returns to Idle |
//! | [`Error::PublishFailure`] | a publish tick | Reported, state unchanged |
//! | [`Error::Serialize`] | a publish tick | Reported, state unchanged |
//! | [`Error::DisconnectFailure`] | `stop()` | Ignored |
//!
//! There is no retry or backoff: the next scheduled tick is the retry.

use std::time::Duration;

use thiserror::Error;

use crate::state::SchedulerState;

/// Errors that can occur in the scan/publish loop.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Scanning requires an OS permission that has not been granted.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The scan provider could not produce results.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// The broker could not be reached within the connect timeout.
    #[error("Connection to {broker} failed: {reason}")]
    ConnectFailure {
        /// Broker URI that was dialed.
        broker: String,
        /// Why the attempt failed.
        reason: String,
    },

    /// A snapshot could not be delivered.
    #[error("Publish to '{topic}' failed: {reason}")]
    PublishFailure {
        /// Destination topic.
        topic: String,
        /// Why delivery failed.
        reason: String,
    },

    /// Disconnecting from the broker failed.
    #[error("Disconnect failed: {0}")]
    DisconnectFailure(String),

    /// A snapshot could not be encoded as JSON.
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The operation is not valid in the scheduler's current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State at the time of the call.
        state: SchedulerState,
    },

    /// The scan interval must be at least one second.
    #[error("Invalid interval: must be a positive number of seconds")]
    InvalidInterval,

    /// The operation was superseded by `stop()`.
    #[error("Operation cancelled")]
    Cancelled,

    /// The scheduler task has shut down.
    #[error("Scheduler is not running")]
    SchedulerClosed,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a connection failure for a broker.
    pub fn connect_failure(broker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailure {
            broker: broker.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection failure caused by the connect timeout elapsing.
    pub fn connect_timeout(broker: impl Into<String>, duration: Duration) -> Self {
        Self::ConnectFailure {
            broker: broker.into(),
            reason: format!("timed out after {:?}", duration),
        }
    }

    /// Create a publish failure for a topic.
    pub fn publish_failure(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailure {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using bssidcast-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
