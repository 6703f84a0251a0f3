//! Mock collaborators for testing.
//!
//! [`MockScanProvider`] and [`MockPublishClient`] implement the scheduler's
//! capability traits without radio hardware or a broker.
//!
//! # Features
//!
//! - **Failure injection**: deny permission, fail scans, connects, publishes or disconnects
//! - **Latency simulation**: delay scans and connects to exercise timeouts and stale results
//! - **Recording**: every published message is kept for inspection

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use bssidcast_types::Observation;

use crate::error::{Error, Result};
use crate::traits::{PublishClient, QoS, ScanProvider};

/// A scan provider returning a configurable set of observations.
///
/// # Example
///
/// ```
/// use bssidcast_core::{MockScanProvider, ScanProvider};
/// use bssidcast_types::Observation;
///
/// #[tokio::main]
/// async fn main() {
///     let provider = MockScanProvider::with_observations(vec![
///         Observation::new("HomeNet", "AA:BB:CC:11:22:33", -48, 2437),
///     ]);
///     provider.trigger_scan().await.unwrap();
///     assert_eq!(provider.last_results().await.len(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockScanProvider {
    observations: RwLock<Vec<Observation>>,
    last: RwLock<Vec<Observation>>,
    scan_count: AtomicU32,
    permission_denied: AtomicBool,
    should_fail: AtomicBool,
    /// Simulated scan latency in milliseconds (0 = no delay).
    scan_latency_ms: AtomicU64,
}

impl MockScanProvider {
    /// Create a provider that sees no networks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that reports `observations` on every scan.
    pub fn with_observations(observations: Vec<Observation>) -> Self {
        Self {
            observations: RwLock::new(observations),
            ..Self::default()
        }
    }

    /// Replace what the next scans will report.
    pub async fn set_observations(&self, observations: Vec<Observation>) {
        *self.observations.write().await = observations;
    }

    /// Make `check_permission` fail.
    pub fn set_permission_denied(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::Relaxed);
    }

    /// Make `trigger_scan` fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Set simulated scan latency.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_scan_latency(&self, latency: Duration) {
        self.scan_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of scans triggered so far.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScanProvider for MockScanProvider {
    async fn check_permission(&self) -> Result<()> {
        if self.permission_denied.load(Ordering::Relaxed) {
            Err(Error::PermissionDenied(
                "location permission not granted".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn trigger_scan(&self) -> Result<()> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);

        let latency = self.scan_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.check_permission().await?;
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::ScanFailed("mock scan failure".to_string()));
        }

        *self.last.write().await = self.observations.read().await.clone();
        Ok(())
    }

    async fn last_results(&self) -> Vec<Observation> {
        self.last.read().await.clone()
    }
}

/// A message recorded by [`MockPublishClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

/// A publish client that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct MockPublishClient {
    connected: AtomicBool,
    connect_count: AtomicU32,
    disconnect_count: AtomicU32,
    last_client_id: RwLock<Option<String>>,
    published: RwLock<Vec<PublishedMessage>>,
    fail_connect: AtomicBool,
    fail_publish: AtomicBool,
    fail_disconnect: AtomicBool,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
}

impl MockPublishClient {
    /// Create a client that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Make `publish` fail.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::Relaxed);
    }

    /// Make `disconnect` fail.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::Relaxed);
    }

    /// Set simulated connect latency.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::Relaxed)
    }

    /// Client ID passed to the last connect.
    pub async fn last_client_id(&self) -> Option<String> {
        self.last_client_id.read().await.clone()
    }

    /// Messages published so far.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().await.clone()
    }

    /// Number of messages published so far.
    pub async fn publish_count(&self) -> usize {
        self.published.read().await.len()
    }
}

#[async_trait]
impl PublishClient for MockPublishClient {
    async fn connect(&self, broker_uri: &str, client_id: &str, timeout_secs: u64) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        *self.last_client_id.write().await = Some(client_id.to_string());

        let latency = Duration::from_millis(self.connect_latency_ms.load(Ordering::Relaxed));
        if latency > Duration::from_secs(timeout_secs) {
            tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
            return Err(Error::connect_timeout(
                broker_uri,
                Duration::from_secs(timeout_secs),
            ));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::connect_failure(broker_uri, "connection refused"));
        }
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(Error::publish_failure(topic, "not connected"));
        }
        if self.fail_publish.load(Ordering::Relaxed) {
            return Err(Error::publish_failure(topic, "mock publish failure"));
        }
        self.published.write().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            qos,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        if self.fail_disconnect.load(Ordering::Relaxed) {
            return Err(Error::DisconnectFailure("mock disconnect failure".to_string()));
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Observation> {
        vec![
            Observation::new("HomeNet", "AA:BB:CC:11:22:33", -48, 2437),
            Observation::new("", "00:1A:2B:3C:4D:5E", -83, 5745),
        ]
    }

    #[tokio::test]
    async fn test_scan_provider_results() {
        let provider = MockScanProvider::with_observations(sample());
        assert!(provider.last_results().await.is_empty());

        provider.trigger_scan().await.unwrap();
        assert_eq!(provider.last_results().await, sample());
        assert_eq!(provider.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_provider_failures() {
        let provider = MockScanProvider::with_observations(sample());

        provider.set_should_fail(true);
        assert!(matches!(
            provider.trigger_scan().await,
            Err(Error::ScanFailed(_))
        ));
        assert!(provider.last_results().await.is_empty());

        provider.set_should_fail(false);
        provider.set_permission_denied(true);
        assert!(matches!(
            provider.check_permission().await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            provider.trigger_scan().await,
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_client_records_messages() {
        let client = MockPublishClient::new();
        client.connect("tcp://localhost:1883", "test_1", 10).await.unwrap();
        assert!(client.is_connected().await);
        assert_eq!(client.last_client_id().await.as_deref(), Some("test_1"));

        client
            .publish("a/b", b"hello".to_vec(), QoS::AtLeastOnce)
            .await
            .unwrap();
        let published = client.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "a/b");
        assert_eq!(published[0].payload, b"hello");
        assert_eq!(published[0].qos, QoS::AtLeastOnce);
    }

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let client = MockPublishClient::new();
        let result = client.publish("a/b", Vec::new(), QoS::AtMostOnce).await;
        assert!(matches!(result, Err(Error::PublishFailure { .. })));
    }

    #[tokio::test]
    async fn test_connect_failure_injection() {
        let client = MockPublishClient::new();
        client.set_fail_connect(true);
        let result = client.connect("tcp://localhost:1883", "id", 10).await;
        assert!(matches!(result, Err(Error::ConnectFailure { .. })));
        assert!(!client.is_connected().await);
        assert_eq!(client.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_latency_beyond_timeout() {
        let client = MockPublishClient::new();
        client.set_connect_latency(Duration::from_secs(30));
        let result = client.connect("tcp://localhost:1883", "id", 10).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_disconnect_failure_still_disconnects() {
        let client = MockPublishClient::new();
        client.connect("tcp://localhost:1883", "id", 10).await.unwrap();
        client.set_fail_disconnect(true);
        assert!(client.disconnect().await.is_err());
        assert!(!client.is_connected().await);
        assert_eq!(client.disconnect_count(), 1);
    }
}
