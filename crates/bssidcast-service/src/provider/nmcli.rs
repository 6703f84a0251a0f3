//! Linux scanning through NetworkManager.
//!
//! A scan is a best-effort `nmcli dev wifi rescan` (it may need privileges
//! and its failure is ignored) followed by a terse listing:
//!
//! ```text
//! $ nmcli -t -f SSID,BSSID,SIGNAL,FREQ dev wifi list
//! HomeNet:AA\:BB\:CC\:DD\:EE\:01:82:2437 MHz
//! :AA\:BB\:CC\:DD\:EE\:02:40:5180 MHz
//! ```
//!
//! Terse output escapes `:` and `\` inside fields with a backslash.
//! NetworkManager reports signal as a percentage; it is converted back to
//! dBm so the normalizer sees the same input as on other platforms.
//!
//! With an [`IwlistProvider`] fallback attached, any nmcli failure retries
//! the scan through `iwlist`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use bssidcast_core::{Error, Observation, Result, ScanProvider};

use super::IwlistProvider;

/// Snapshot `device` label for nmcli scans.
pub const NMCLI_SOURCE_LABEL: &str = "linux";

const RESCAN_TIMEOUT: Duration = Duration::from_secs(10);
const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Convert NetworkManager's signal percentage to dBm.
///
/// NetworkManager derives the percentage as `2 * (dBm + 100)`; this is the
/// inverse with integer division.
pub fn percent_to_dbm(percent: u8) -> i32 {
    i32::from(percent.min(100)) / 2 - 100
}

/// Split one line of `nmcli -t` output into unescaped fields.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse `nmcli -t -f SSID,BSSID,SIGNAL,FREQ dev wifi list` output.
///
/// Lines with fewer than four fields or an empty BSSID are skipped. An
/// unparseable signal counts as 0%, an unparseable frequency as 0 MHz.
pub fn parse_nmcli_output(output: &str) -> Vec<Observation> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            let [ssid, bssid, signal, freq, ..] = fields.as_slice() else {
                return None;
            };
            if bssid.is_empty() {
                return None;
            }

            let percent = signal.trim().parse::<u8>().unwrap_or(0);
            let frequency_mhz = freq
                .split_whitespace()
                .next()
                .and_then(|f| f.parse::<u32>().ok())
                .unwrap_or(0);

            Some(Observation::new(
                ssid.as_str(),
                bssid.as_str(),
                percent_to_dbm(percent),
                frequency_mhz,
            ))
        })
        .collect()
}

/// [`ScanProvider`] backed by `nmcli`.
#[derive(Debug)]
pub struct NmcliProvider {
    interface: Option<String>,
    fallback: Option<IwlistProvider>,
    last: RwLock<Vec<Observation>>,
}

impl NmcliProvider {
    /// Create a provider, optionally restricted to one interface.
    pub fn new(interface: Option<String>) -> Self {
        Self {
            interface,
            fallback: None,
            last: RwLock::new(Vec::new()),
        }
    }

    /// Retry failed scans through `fallback`.
    #[must_use]
    pub fn with_fallback(mut self, fallback: IwlistProvider) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Whether a fallback scanner is attached.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    fn args<'a>(&'a self, base: &[&'a str]) -> Vec<&'a str> {
        let mut args = base.to_vec();
        if let Some(interface) = &self.interface {
            args.extend(["ifname", interface.as_str()]);
        }
        args
    }

    async fn scan(&self) -> Result<Vec<Observation>> {
        match super::run_command("nmcli", self.args(&["dev", "wifi", "rescan"]), RESCAN_TIMEOUT)
            .await
        {
            Ok(output) if !output.status.success() => {
                debug!(
                    "nmcli rescan failed (using cached results): {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ScanFailed(
                    "nmcli not found. Install NetworkManager.".to_string(),
                ));
            }
            Err(e) => debug!("nmcli rescan failed (using cached results): {}", e),
        }

        let list_args = self.args(&["-t", "-f", "SSID,BSSID,SIGNAL,FREQ", "dev", "wifi", "list"]);
        let output = super::run_command("nmcli", list_args, LIST_TIMEOUT)
            .await
            .map_err(|e| Error::ScanFailed(format!("failed to run nmcli: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.to_lowercase().contains("not authorized") {
                return Err(Error::PermissionDenied(format!("nmcli: {}", stderr)));
            }
            return Err(Error::ScanFailed(format!(
                "nmcli exited with {}: {}",
                output.status, stderr
            )));
        }

        let observations = parse_nmcli_output(&String::from_utf8_lossy(&output.stdout));
        debug!("nmcli scan returned {} networks", observations.len());
        Ok(observations)
    }
}

#[async_trait]
impl ScanProvider for NmcliProvider {
    async fn trigger_scan(&self) -> Result<()> {
        let observations = match (self.scan().await, &self.fallback) {
            (Ok(observations), _) => observations,
            (Err(e), Some(fallback)) => {
                warn!("nmcli scan failed ({}), falling back to iwlist", e);
                fallback.scan().await?
            }
            (Err(e), None) => return Err(e),
        };
        *self.last.write().await = observations;
        Ok(())
    }

    async fn last_results(&self) -> Vec<Observation> {
        self.last.read().await.clone()
    }
}
