//! Snapshot assembly and the display-only view of a scan.
//!
//! [`SnapshotBuilder`] produces the full, unsorted payload that gets
//! published. [`DisplayView`] is the human-facing listing: strongest first,
//! capped at [`DISPLAY_LIMIT`] entries. The cap never applies to what is
//! published.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use bssidcast_types::normalize::normalize;
use bssidcast_types::{DEFAULT_SOURCE_LABEL, Observation, Snapshot};

/// Maximum number of entries in a [`DisplayView`].
pub const DISPLAY_LIMIT: usize = 10;

/// Time source for snapshot timestamps.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// The system clock.
pub fn system_clock() -> Clock {
    Arc::new(OffsetDateTime::now_utc)
}

/// Builds timestamped snapshots from raw scan results.
#[derive(Clone)]
pub struct SnapshotBuilder {
    source_label: String,
    clock: Clock,
}

impl fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("source_label", &self.source_label)
            .finish_non_exhaustive()
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_LABEL)
    }
}

impl SnapshotBuilder {
    /// Create a builder stamping snapshots with `source_label` and the system clock.
    pub fn new(source_label: impl Into<String>) -> Self {
        Self {
            source_label: source_label.into(),
            clock: system_clock(),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Label written to the payload's `device` field.
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// Normalize every observation and stamp the result with the current time.
    ///
    /// No filtering or reordering happens here.
    pub fn build(&self, observations: &[Observation]) -> Snapshot {
        Snapshot::from_observations(observations, self.source_label.as_str(), (self.clock)())
    }
}

/// Build a broker client ID of the form `<prefix>_<unix-millis>`.
pub fn client_id(prefix: &str, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{}_{}", prefix, millis)
}

/// One row of the human-facing listing.
///
/// Unlike the published form, the BSSID keeps the case the platform reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub ssid: String,
    pub bssid: String,
    pub signal: u8,
    pub channel: u32,
    pub rssi_dbm: i32,
}

impl From<&Observation> for DisplayEntry {
    fn from(obs: &Observation) -> Self {
        let normalized = normalize(obs);
        Self {
            ssid: normalized.ssid,
            bssid: obs.bssid.clone(),
            signal: normalized.signal,
            channel: normalized.channel,
            rssi_dbm: normalized.rssi_dbm,
        }
    }
}

/// Strongest-first listing of a scan, truncated for display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DisplayView {
    entries: Vec<DisplayEntry>,
    total: usize,
}

impl DisplayView {
    /// Build a view with the default [`DISPLAY_LIMIT`].
    pub fn new(observations: &[Observation]) -> Self {
        Self::from_observations(observations, DISPLAY_LIMIT)
    }

    /// Sort by RSSI descending and keep the first `limit` entries.
    ///
    /// The sort is stable: equal RSSI values keep scan order.
    pub fn from_observations(observations: &[Observation], limit: usize) -> Self {
        let mut entries: Vec<DisplayEntry> = observations.iter().map(DisplayEntry::from).collect();
        entries.sort_by(|a, b| b.rssi_dbm.cmp(&a.rssi_dbm));
        entries.truncate(limit);
        Self {
            entries,
            total: observations.len(),
        }
    }

    /// Entries shown, strongest first.
    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    /// Number of networks the scan saw.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of networks left out of the listing.
    pub fn omitted(&self) -> usize {
        self.total - self.entries.len()
    }

    /// Whether the scan saw no networks.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// `"... and N more"` when entries were left out.
    pub fn omitted_summary(&self) -> Option<String> {
        match self.omitted() {
            0 => None,
            n => Some(format!("... and {} more", n)),
        }
    }
}
