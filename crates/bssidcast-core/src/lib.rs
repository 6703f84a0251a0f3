//! Scan-and-publish core for Wi-Fi neighborhood snapshots.
//!
//! This crate turns periodic Wi-Fi scans into JSON snapshots of the visible
//! access points and publishes them to an MQTT topic.
//!
//! # Features
//!
//! - **Scheduling**: Idle / Connecting / Publishing state machine with a
//!   completion-relative scan interval
//! - **Snapshots**: Normalized, timestamped, device-labeled network lists
//! - **Display**: Strongest-first listings capped for on-screen rendering
//! - **Events**: Broadcast stream of state, status and publish results
//! - **Testing**: Mock scan provider and broker client
//!
//! Platform scanning and the broker transport are injected through the
//! [`ScanProvider`] and [`PublishClient`] traits.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use bssidcast_core::{MockPublishClient, MockScanProvider, Observation, PublishScheduler, SchedulerConfig};
//!
//! #[tokio::main]
//! async fn main() -> bssidcast_core::Result<()> {
//!     let provider = Arc::new(MockScanProvider::with_observations(vec![
//!         Observation::new("HomeNet", "AA:BB:CC:DD:EE:FF", -45, 2437),
//!     ]));
//!     let client = Arc::new(MockPublishClient::new());
//!
//!     let scheduler = PublishScheduler::spawn(provider, client.clone(), SchedulerConfig::default());
//!     let view = scheduler.scan_once().await?;
//!     println!("{} networks in range", view.total());
//!
//!     scheduler.start(5).await?;
//!     scheduler.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod events;
pub mod mock;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod traits;

// Core exports
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, SchedulerEvent};
pub use mock::{MockPublishClient, MockScanProvider, PublishedMessage};
pub use scheduler::{
    DEFAULT_BROKER_URI, DEFAULT_CONNECT_TIMEOUT, DEFAULT_INTERVAL_SECS, DEFAULT_TOPIC,
    PublishScheduler, SchedulerConfig,
};
pub use snapshot::{
    Clock, DISPLAY_LIMIT, DisplayEntry, DisplayView, SnapshotBuilder, client_id, system_clock,
};
pub use state::SchedulerState;
pub use traits::{PublishClient, QoS, ScanProvider};

// Re-export from bssidcast-types
pub use bssidcast_types::{
    DEFAULT_SOURCE_LABEL, NormalizedObservation, Observation, Snapshot, normalize,
};
