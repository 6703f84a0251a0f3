//! Windows scanning through `netsh`.
//!
//! `netsh wlan show networks mode=bssid` groups access points under their
//! SSID:
//!
//! ```text
//! SSID 1 : HomeNet
//!     Network type            : Infrastructure
//!     BSSID 1                 : aa:bb:cc:dd:ee:01
//!          Signal             : 84%
//!          Channel            : 6
//! ```
//!
//! Windows reports a signal percentage and a channel number. Both are
//! converted back to dBm and MHz so the normalizer sees the same input as
//! on other platforms.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use bssidcast_core::normalize::channel_frequency;
use bssidcast_core::{Error, Observation, Result, ScanProvider};

use super::percent_to_dbm;

/// Snapshot `device` label for netsh scans.
pub const NETSH_SOURCE_LABEL: &str = "windows";

const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields collected for one `BSSID n : ...` block.
#[derive(Default)]
struct BssidBlock {
    bssid: Option<String>,
    signal: Option<u8>,
    channel: Option<u32>,
}

impl BssidBlock {
    fn into_observation(self, ssid: &str) -> Option<Observation> {
        let bssid = self.bssid?;
        Some(Observation::new(
            ssid,
            bssid,
            percent_to_dbm(self.signal.unwrap_or(0)),
            channel_frequency(self.channel.unwrap_or(0)),
        ))
    }
}

/// Split a `key : value` line on the first `" : "`.
///
/// A trailing `" :"` yields an empty value (hidden SSIDs).
fn split_kv(line: &str) -> Option<(&str, &str)> {
    if let Some(idx) = line.find(" : ") {
        return Some((line[..idx].trim(), line[idx + 3..].trim()));
    }
    line.strip_suffix(" :").map(|key| (key.trim(), ""))
}

/// Leading ASCII digits of `value`, parsed.
fn leading_number(value: &str) -> Option<u32> {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

fn is_mac(value: &str) -> bool {
    let groups: Vec<&str> = value.split(':').collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Parse `netsh wlan show networks mode=bssid` output.
///
/// Lines that match nothing (interface headers, authentication details,
/// localized labels) are skipped. A BSSID block with a malformed MAC is
/// dropped. A missing signal counts as 0%, a missing channel as unknown.
pub fn parse_netsh_output(output: &str) -> Vec<Observation> {
    let mut observations = Vec::new();
    let mut ssid = String::new();
    let mut block: Option<BssidBlock> = None;

    for line in output.lines() {
        let line = line.trim();
        let Some((key, value)) = split_kv(line) else {
            continue;
        };
        let key = key.to_ascii_lowercase();

        if key.starts_with("bssid") {
            if let Some(done) = block.take().and_then(|b| b.into_observation(&ssid)) {
                observations.push(done);
            }
            block = Some(BssidBlock {
                bssid: is_mac(value).then(|| value.to_string()),
                ..BssidBlock::default()
            });
        } else if key.starts_with("ssid") {
            if let Some(done) = block.take().and_then(|b| b.into_observation(&ssid)) {
                observations.push(done);
            }
            ssid = value.to_string();
        } else if let Some(current) = block.as_mut() {
            if key.starts_with("signal") {
                current.signal = leading_number(value).map(|pct| pct.min(100) as u8);
            } else if key.starts_with("channel") && !key.contains("utilization") {
                current.channel = leading_number(value);
            }
        }
    }

    if let Some(done) = block.and_then(|b| b.into_observation(&ssid)) {
        observations.push(done);
    }
    observations
}

/// Whether netsh output says the process may not read scan results.
fn is_permission_error(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("location permission") || text.contains("access is denied")
}

/// [`ScanProvider`] backed by `netsh wlan`.
#[derive(Debug, Default)]
pub struct NetshProvider {
    last: RwLock<Vec<Observation>>,
}

impl NetshProvider {
    /// Create a provider.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanProvider for NetshProvider {
    async fn trigger_scan(&self) -> Result<()> {
        let output = super::run_command(
            "netsh",
            ["wlan", "show", "networks", "mode=bssid"],
            SCAN_TIMEOUT,
        )
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::ScanFailed("netsh not found. This provider requires Windows.".to_string())
            }
            _ => Error::ScanFailed(format!("failed to run netsh: {}", e)),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            // netsh prints its diagnostics on stdout.
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!("{} {}", stdout.trim(), stderr.trim());
            let message = message.trim();
            if is_permission_error(message) {
                return Err(Error::PermissionDenied(format!("netsh: {}", message)));
            }
            return Err(Error::ScanFailed(format!(
                "netsh exited with {}: {}",
                output.status, message
            )));
        }

        let observations = parse_netsh_output(&stdout);
        debug!("netsh scan returned {} networks", observations.len());
        *self.last.write().await = observations;
        Ok(())
    }

    async fn last_results(&self) -> Vec<Observation> {
        self.last.read().await.clone()
    }
}
