//! Capabilities the scheduler depends on.
//!
//! The core never talks to radio hardware or to a broker directly. A host
//! application injects a [`ScanProvider`] for the platform's Wi-Fi API and a
//! [`PublishClient`] for its message broker; tests inject the mocks from
//! [`crate::mock`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bssidcast_types::Observation;

use crate::error::{Error, Result};

/// Platform Wi-Fi scanning capability.
///
/// # Example
///
/// ```ignore
/// use bssidcast_core::{Result, ScanProvider};
///
/// async fn scan<P: ScanProvider>(provider: &P) -> Result<usize> {
///     provider.trigger_scan().await?;
///     Ok(provider.last_results().await.len())
/// }
/// ```
#[async_trait]
pub trait ScanProvider: Send + Sync {
    /// Check that the OS grants scan access.
    ///
    /// Returns [`Error::PermissionDenied`] when it does not. The default
    /// implementation assumes access is always granted.
    async fn check_permission(&self) -> Result<()> {
        Ok(())
    }

    /// Run a scan and wait for it to complete.
    async fn trigger_scan(&self) -> Result<()>;

    /// Observations from the most recent completed scan.
    async fn last_results(&self) -> Vec<Observation>;
}

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// Fire and forget (0).
    AtMostOnce,
    /// Acknowledged delivery, possibly duplicated (1).
    #[default]
    AtLeastOnce,
    /// Exactly-once handshake (2).
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(Error::invalid_config(format!(
                "QoS must be 0, 1 or 2 (got {})",
                other
            ))),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Message broker publishing capability.
///
/// Implementations own their connection handle; the scheduler only drives
/// the lifecycle through this contract.
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Connect to `broker_uri` as `client_id`.
    ///
    /// Implementations should give up after `timeout_secs` and return
    /// [`Error::ConnectFailure`].
    async fn connect(&self, broker_uri: &str, client_id: &str, timeout_secs: u64) -> Result<()>;

    /// Publish `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the connection is currently up.
    async fn is_connected(&self) -> bool;
}
