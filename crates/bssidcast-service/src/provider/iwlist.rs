//! Linux scanning through wireless-tools' `iwlist`.
//!
//! Used directly or as the fallback when NetworkManager is missing or
//! fails. `iwlist <iface> scan` usually needs root; without it most drivers
//! refuse the scan.
//!
//! ```text
//! wlan0     Scan completed :
//!           Cell 01 - Address: AA:BB:CC:DD:EE:01
//!                     Channel:6
//!                     Frequency:2.437 GHz (Channel 6)
//!                     Quality=59/70  Signal level=-51 dBm
//!                     ESSID:"HomeNet"
//! ```
//!
//! Some drivers report `Signal level` as a ratio such as `60/100` instead of
//! dBm; the ratio is treated as a percentage and converted back to dBm.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use bssidcast_core::normalize::channel_frequency;
use bssidcast_core::{Error, Observation, Result, ScanProvider};

use super::percent_to_dbm;

/// Snapshot `device` label for iwlist scans.
pub const IWLIST_SOURCE_LABEL: &str = "linux";

/// Interfaces tried in order when none is configured.
pub const DEFAULT_INTERFACES: [&str; 4] = ["wlan0", "wlp2s0", "wlp3s0", "wifi0"];

const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
struct Cell {
    bssid: String,
    ssid: String,
    rssi_dbm: Option<i32>,
    frequency_mhz: Option<u32>,
    channel: Option<u32>,
}

impl Cell {
    fn into_observation(self) -> Observation {
        let frequency_mhz = self
            .frequency_mhz
            .unwrap_or_else(|| channel_frequency(self.channel.unwrap_or(0)));
        Observation::new(
            self.ssid,
            self.bssid,
            self.rssi_dbm.unwrap_or_else(|| percent_to_dbm(0)),
            frequency_mhz,
        )
    }
}

/// Parse `Signal level=-51 dBm` or `Signal level=60/100` into dBm.
fn parse_signal_level(line: &str) -> Option<i32> {
    let idx = line.find("Signal level")?;
    let value = line[idx + "Signal level".len()..]
        .trim_start_matches(['=', ':'])
        .trim_start();
    let token = value.split_whitespace().next()?;

    if let Some((num, den)) = token.split_once('/') {
        let num: u32 = num.parse().ok()?;
        let den: u32 = den.parse().ok()?;
        if den == 0 {
            return None;
        }
        let percent = (num.saturating_mul(100) / den).min(100) as u8;
        return Some(percent_to_dbm(percent));
    }

    if value[token.len()..].trim_start().starts_with("dBm") {
        return token.parse().ok();
    }
    token.strip_suffix("dBm").and_then(|t| t.parse().ok())
}

/// Parse `Frequency:2.437 GHz` into MHz.
fn parse_frequency(line: &str) -> Option<u32> {
    let value = line.split_once("Frequency:")?.1.trim_start();
    let ghz: f64 = value.split_whitespace().next()?.parse().ok()?;
    Some((ghz * 1000.0).round() as u32)
}

/// Parse `iwlist <iface> scan` output.
///
/// Cells without an address are dropped. An explicit frequency wins over a
/// bare channel number; a missing signal counts as -100 dBm.
pub fn parse_iwlist_output(output: &str) -> Vec<Observation> {
    let mut observations = Vec::new();
    let mut cell: Option<Cell> = None;

    for line in output.lines() {
        let line = line.trim();

        if line.starts_with("Cell ") {
            if let Some(done) = cell.take().filter(|c| !c.bssid.is_empty()) {
                observations.push(done.into_observation());
            }
            let bssid = line
                .split_once("Address:")
                .map(|(_, mac)| mac.trim().to_string())
                .unwrap_or_default();
            cell = Some(Cell {
                bssid,
                ..Cell::default()
            });
            continue;
        }

        let Some(current) = cell.as_mut() else {
            continue;
        };

        if let Some(essid) = line.strip_prefix("ESSID:") {
            current.ssid = essid.trim().trim_matches('"').to_string();
        } else if line.starts_with("Frequency:") {
            current.frequency_mhz = parse_frequency(line);
        } else if let Some(ch) = line.strip_prefix("Channel:") {
            current.channel = ch.trim().parse().ok();
        } else if line.contains("Signal level") {
            current.rssi_dbm = parse_signal_level(line);
        }
    }

    if let Some(done) = cell.filter(|c| !c.bssid.is_empty()) {
        observations.push(done.into_observation());
    }
    observations
}

/// [`ScanProvider`] backed by `iwlist`.
#[derive(Debug)]
pub struct IwlistProvider {
    interfaces: Vec<String>,
    last: RwLock<Vec<Observation>>,
}

impl IwlistProvider {
    /// Create a provider for `interface`, or for [`DEFAULT_INTERFACES`] in
    /// order when unset.
    pub fn new(interface: Option<String>) -> Self {
        let interfaces = match interface {
            Some(interface) => vec![interface],
            None => DEFAULT_INTERFACES.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            interfaces,
            last: RwLock::new(Vec::new()),
        }
    }

    /// Interfaces this provider will try.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Scan the first interface that answers.
    pub(crate) async fn scan(&self) -> Result<Vec<Observation>> {
        let mut last_error = None;

        for interface in &self.interfaces {
            let output =
                match super::run_command("iwlist", [interface.as_str(), "scan"], SCAN_TIMEOUT).await
                {
                    Ok(output) => output,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(Error::ScanFailed(
                            "No WiFi scanning tool available. Install NetworkManager or wireless-tools."
                                .to_string(),
                        ));
                    }
                    Err(e) => {
                        last_error = Some(Error::ScanFailed(format!("iwlist {}: {}", interface, e)));
                        continue;
                    }
                };

            if output.status.success() {
                let observations = parse_iwlist_output(&String::from_utf8_lossy(&output.stdout));
                debug!(
                    "iwlist scan on {} returned {} networks",
                    interface,
                    observations.len()
                );
                return Ok(observations);
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            debug!("iwlist scan on {} failed: {}", interface, stderr);
            last_error = Some(if stderr.contains("Operation not permitted") {
                Error::PermissionDenied(format!("iwlist {}: {}", interface, stderr))
            } else {
                Error::ScanFailed(format!("iwlist {}: {}", interface, stderr))
            });
        }

        Err(last_error.unwrap_or_else(|| Error::ScanFailed("no wireless interface to scan".to_string())))
    }
}

#[async_trait]
impl ScanProvider for IwlistProvider {
    async fn trigger_scan(&self) -> Result<()> {
        let observations = self.scan().await?;
        *self.last.write().await = observations;
        Ok(())
    }

    async fn last_results(&self) -> Vec<Observation> {
        self.last.read().await.clone()
    }
}
