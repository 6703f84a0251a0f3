//! Android scanning through Termux:API.
//!
//! `termux-wifi-scaninfo` prints the platform's last scan results as a JSON
//! array, or a JSON object with an `error` key when scanning is unavailable
//! (most often because Termux:API lacks the location permission).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use bssidcast_core::{Error, Observation, Result, ScanProvider};

/// Scan binary shipped by the `termux-api` package.
pub const TERMUX_SCAN_BINARY: &str = "termux-wifi-scaninfo";

/// Snapshot `device` label for Termux scans.
pub const TERMUX_SOURCE_LABEL: &str = "android";

const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// RSSI assumed when an entry omits it.
const MISSING_RSSI_DBM: i32 = -100;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScanInfo {
    Networks(Vec<TermuxNetwork>),
    Failure { error: String },
}

#[derive(Debug, Deserialize)]
struct TermuxNetwork {
    #[serde(default)]
    ssid: Option<String>,
    #[serde(default)]
    bssid: Option<String>,
    #[serde(default)]
    rssi: Option<i32>,
    #[serde(default)]
    frequency_mhz: Option<u32>,
}

/// Parse `termux-wifi-scaninfo` output.
///
/// Entries without a BSSID are skipped. An error object becomes
/// [`Error::PermissionDenied`] when it mentions permissions and
/// [`Error::ScanFailed`] otherwise.
pub fn parse_scan_info(output: &str) -> Result<Vec<Observation>> {
    let info: ScanInfo = serde_json::from_str(output)
        .map_err(|e| Error::ScanFailed(format!("failed to parse scan results: {}", e)))?;

    match info {
        ScanInfo::Networks(networks) => Ok(networks
            .into_iter()
            .filter_map(|net| {
                let bssid = net.bssid.filter(|b| !b.is_empty())?;
                Some(Observation::new(
                    net.ssid.unwrap_or_default(),
                    bssid,
                    net.rssi.unwrap_or(MISSING_RSSI_DBM),
                    net.frequency_mhz.unwrap_or(0),
                ))
            })
            .collect()),
        ScanInfo::Failure { error } if error.to_lowercase().contains("permission") => {
            Err(Error::PermissionDenied(format!("Termux API: {}", error)))
        }
        ScanInfo::Failure { error } => Err(Error::ScanFailed(format!("Termux API error: {}", error))),
    }
}

/// [`ScanProvider`] backed by `termux-wifi-scaninfo`.
#[derive(Debug)]
pub struct TermuxProvider {
    binary: String,
    last: RwLock<Vec<Observation>>,
}

impl TermuxProvider {
    /// Create a provider using the binary on `PATH`.
    pub fn new() -> Self {
        Self::with_binary(TERMUX_SCAN_BINARY)
    }

    /// Create a provider that runs `binary` instead.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            last: RwLock::new(Vec::new()),
        }
    }
}

impl Default for TermuxProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanProvider for TermuxProvider {
    async fn trigger_scan(&self) -> Result<()> {
        let output = super::run_command(&self.binary, std::iter::empty::<&str>(), SCAN_TIMEOUT)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ScanFailed(format!(
                    "{} not found. Install the termux-api package.",
                    self.binary
                )),
                std::io::ErrorKind::TimedOut => Error::ScanFailed("WiFi scan timed out".to_string()),
                _ => Error::ScanFailed(format!("failed to run {}: {}", self.binary, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ScanFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let observations = parse_scan_info(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Termux scan returned {} networks", observations.len());
        *self.last.write().await = observations;
        Ok(())
    }

    async fn last_results(&self) -> Vec<Observation> {
        self.last.read().await.clone()
    }
}
