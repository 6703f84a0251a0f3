//! Command-line host for the bssidcast scan-and-publish loop.
//!
//! This crate provides:
//! - Scan providers for Termux:API (Android), NetworkManager and
//!   wireless-tools (Linux), and netsh (Windows)
//! - An MQTT [`PublishClient`](bssidcast_core::PublishClient) built on `rumqttc`
//! - TOML configuration with validation
//! - Table rendering of scan results
//!
//! # Configuration
//!
//! The scanner reads configuration from `~/.config/bssidcast/config.toml`:
//!
//! ```toml
//! [mqtt]
//! broker_uri = "tcp://test.mosquitto.org:1883"
//! topic = "geoloc/wifi/bssids"
//! qos = 1
//! keep_alive = 60
//! connect_timeout = 10
//!
//! [scan]
//! interval_seconds = 5
//! provider = "auto"
//! ```

pub mod config;
pub mod format;
pub mod mqtt;
pub mod provider;

pub use config::{Config, ConfigError, MqttConfig, ScanConfig, ValidationError};
pub use format::format_display_view;
pub use mqtt::{BrokerAddress, MqttPublishClient, parse_broker_url};
pub use provider::{IwlistProvider, NetshProvider, NmcliProvider, ProviderKind, TermuxProvider};
