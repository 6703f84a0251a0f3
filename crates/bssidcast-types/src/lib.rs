//! Platform-agnostic types for bssidcast.
//!
//! This crate holds the data model shared by the core scheduler and any
//! host application:
//!
//! - [`Observation`]: a raw access point as reported by a scan
//! - [`NormalizedObservation`]: the published form of an observation
//! - [`Snapshot`]: one timestamped scan cycle, ready to serialize
//! - [`normalize`]: the signal/channel/SSID normalization rules
//!
//! # Example
//!
//! ```
//! use bssidcast_types::{Observation, normalize};
//!
//! let obs = Observation::new("", "AA:BB:CC:11:22:33", -45, 5180);
//! let normalized = normalize::normalize(&obs);
//!
//! assert_eq!(normalized.ssid, "<Hidden>");
//! assert_eq!(normalized.bssid, "aa:bb:cc:11:22:33");
//! assert_eq!(normalized.signal, 75);
//! assert_eq!(normalized.channel, 36);
//! ```

pub mod error;
pub mod normalize;
pub mod timestamp;
pub mod types;

pub use error::{TimestampError, TimestampResult};
pub use normalize::HIDDEN_SSID;
pub use types::{DEFAULT_SOURCE_LABEL, NormalizedObservation, Observation, Snapshot};
