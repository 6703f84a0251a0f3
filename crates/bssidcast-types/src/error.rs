//! Error types for bssidcast-types.

use thiserror::Error;

/// Errors raised while converting snapshot timestamps to or from their wire form.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimestampError {
    /// The timestamp could not be rendered as `YYYY-MM-DDTHH:MM:SSZ`.
    #[error("Failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),

    /// The string is not a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
    #[error("Invalid timestamp: {0}")]
    Parse(#[from] time::error::Parse),
}

/// Result type alias using bssidcast-types' `TimestampError`.
pub type TimestampResult<T> = std::result::Result<T, TimestampError>;
