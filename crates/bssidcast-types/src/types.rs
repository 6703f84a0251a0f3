//! Core types for Wi-Fi neighborhood snapshots.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::normalize::normalize;
use crate::timestamp::truncate_to_utc_seconds;

/// Source label used when the publisher does not provide its own.
pub const DEFAULT_SOURCE_LABEL: &str = "android";

/// A single access point as reported by a scan.
///
/// Observations are produced fresh on every scan and never persisted.
/// The field names accepted on input match the Termux API output
/// (`rssi` is accepted as an alias of `rssi_dbm`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// Network name. Empty for hidden networks.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ssid: String,
    /// Radio MAC address in colon-hex form, in whatever case the platform reports.
    pub bssid: String,
    /// Received signal strength in dBm.
    #[cfg_attr(feature = "serde", serde(alias = "rssi"))]
    pub rssi_dbm: i32,
    /// Center frequency in MHz.
    pub frequency_mhz: u32,
}

impl Observation {
    /// Create a new observation.
    pub fn new(
        ssid: impl Into<String>,
        bssid: impl Into<String>,
        rssi_dbm: i32,
        frequency_mhz: u32,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            bssid: bssid.into(),
            rssi_dbm,
            frequency_mhz,
        }
    }

    /// Whether the network hides its SSID.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty()
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} dBm, {} MHz)",
            crate::normalize::ssid_display(&self.ssid),
            self.bssid,
            self.rssi_dbm,
            self.frequency_mhz
        )
    }
}

/// An observation in its published form.
///
/// Serializes to the `networks[]` entries of the wire payload:
/// `{"ssid", "bssid", "signal", "channel", "rssi_dbm"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalizedObservation {
    /// SSID, or `"<Hidden>"` when the network hides it.
    pub ssid: String,
    /// Lowercase colon-hex BSSID.
    pub bssid: String,
    /// Signal strength percentage (0-100).
    pub signal: u8,
    /// Channel number, 0 when the frequency is outside the known bands.
    pub channel: u32,
    /// Raw signal strength in dBm.
    pub rssi_dbm: i32,
}

impl From<&Observation> for NormalizedObservation {
    fn from(obs: &Observation) -> Self {
        normalize(obs)
    }
}

/// One scan cycle's worth of normalized observations, ready to publish.
///
/// The entry count is fixed at construction, so `count()` always equals
/// `networks().len()`.
///
/// # Example
///
/// ```
/// use bssidcast_types::{Observation, Snapshot};
/// use time::macros::datetime;
///
/// let observations = vec![Observation::new("Cafe", "AA:BB:CC:11:22:33", -60, 2437)];
/// let snapshot = Snapshot::from_observations(&observations, "android", datetime!(2024-05-01 12:30:05 UTC));
///
/// assert_eq!(snapshot.count(), 1);
/// assert_eq!(snapshot.networks()[0].bssid, "aa:bb:cc:11:22:33");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "WireSnapshot"))]
pub struct Snapshot {
    #[cfg_attr(feature = "serde", serde(with = "crate::timestamp::serde_wire"))]
    timestamp: OffsetDateTime,
    device: String,
    count: usize,
    networks: Vec<NormalizedObservation>,
}

impl Snapshot {
    /// Create a snapshot from already-normalized entries.
    ///
    /// The timestamp is converted to UTC and truncated to whole seconds.
    pub fn new(
        timestamp: OffsetDateTime,
        device: impl Into<String>,
        networks: Vec<NormalizedObservation>,
    ) -> Self {
        Self {
            timestamp: truncate_to_utc_seconds(timestamp),
            device: device.into(),
            count: networks.len(),
            networks,
        }
    }

    /// Normalize every observation, in order, into a new snapshot.
    pub fn from_observations(
        observations: &[Observation],
        device: impl Into<String>,
        timestamp: OffsetDateTime,
    ) -> Self {
        let networks = observations.iter().map(normalize).collect();
        Self::new(timestamp, device, networks)
    }

    /// Capture time (UTC, whole seconds).
    #[must_use]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Label identifying the publisher type (e.g. `"android"`).
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Number of networks in the snapshot.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Networks in scan order.
    #[must_use]
    pub fn networks(&self) -> &[NormalizedObservation] {
        &self.networks
    }

    /// Whether the scan saw no networks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Consume the snapshot, returning its networks.
    #[must_use]
    pub fn into_networks(self) -> Vec<NormalizedObservation> {
        self.networks
    }
}

/// Deserialization shape used to re-check the count invariant.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct WireSnapshot {
    #[serde(with = "crate::timestamp::serde_wire")]
    timestamp: OffsetDateTime,
    device: String,
    count: usize,
    networks: Vec<NormalizedObservation>,
}

#[cfg(feature = "serde")]
impl TryFrom<WireSnapshot> for Snapshot {
    type Error = String;

    fn try_from(wire: WireSnapshot) -> Result<Self, Self::Error> {
        if wire.count != wire.networks.len() {
            return Err(format!(
                "count {} does not match {} networks",
                wire.count,
                wire.networks.len()
            ));
        }
        Ok(Self::new(wire.timestamp, wire.device, wire.networks))
    }
}
