//! Scanner configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bssidcast_core::{
    DEFAULT_BROKER_URI, DEFAULT_INTERVAL_SECS, DEFAULT_TOPIC, QoS, SchedulerConfig,
};

use crate::mqtt::parse_broker_url;
use crate::provider::ProviderKind;

/// Scanner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker settings.
    pub mqtt: MqttConfig,
    /// Scan settings.
    pub scan: ScanConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Broker URI has a supported scheme, a host and a valid port
    /// - Topic is non-empty and free of MQTT wildcards
    /// - Connect timeout is non-zero
    /// - Credentials are complete
    /// - Scan interval is within bounds (1s - 1 hour)
    ///
    /// # Example
    ///
    /// ```
    /// use bssidcast_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.mqtt.validate());
        errors.extend(self.scan.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Scheduler settings for a scan source reporting as `source_label`.
    ///
    /// The client ID prefix falls back to the source label when unset.
    pub fn scheduler_config(&self, source_label: &str) -> SchedulerConfig {
        SchedulerConfig {
            broker_uri: self.mqtt.broker_uri.clone(),
            topic: self.mqtt.topic.clone(),
            qos: self.mqtt.qos,
            client_id_prefix: self
                .mqtt
                .client_id_prefix
                .clone()
                .unwrap_or_else(|| source_label.to_string()),
            source_label: source_label.to_string(),
            connect_timeout: Duration::from_secs(self.mqtt.connect_timeout),
            ..SchedulerConfig::default()
        }
    }
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URI (`tcp://`, `mqtt://`, `ssl://` or `mqtts://`).
    pub broker_uri: String,
    /// Topic snapshots are published to.
    pub topic: String,
    /// Quality of service (0, 1, or 2).
    pub qos: QoS,
    /// Client ID prefix. Defaults to the scan source label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id_prefix: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
    /// Seconds to wait for the broker to accept a connection.
    pub connect_timeout: u64,
    /// Username for authentication (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for authentication (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_uri: DEFAULT_BROKER_URI.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            qos: QoS::AtLeastOnce,
            client_id_prefix: None,
            keep_alive: 60,
            connect_timeout: 10,
            username: None,
            password: None,
        }
    }
}

impl MqttConfig {
    /// Validate broker configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = parse_broker_url(&self.broker_uri) {
            errors.push(ValidationError {
                field: "mqtt.broker_uri".to_string(),
                message: e,
            });
        }

        if self.topic.is_empty() {
            errors.push(ValidationError {
                field: "mqtt.topic".to_string(),
                message: "topic cannot be empty".to_string(),
            });
        } else if self.topic.contains(['#', '+']) {
            errors.push(ValidationError {
                field: "mqtt.topic".to_string(),
                message: format!(
                    "topic '{}' cannot contain wildcards ('#' or '+')",
                    self.topic
                ),
            });
        }

        if let Some(prefix) = &self.client_id_prefix
            && prefix.is_empty()
        {
            errors.push(ValidationError {
                field: "mqtt.client_id_prefix".to_string(),
                message: "client ID prefix cannot be empty string (omit it instead)".to_string(),
            });
        }

        if self.connect_timeout == 0 {
            errors.push(ValidationError {
                field: "mqtt.connect_timeout".to_string(),
                message: "connect timeout must be at least 1 second".to_string(),
            });
        }

        if self.password.is_some() && self.username.is_none() {
            errors.push(ValidationError {
                field: "mqtt.password".to_string(),
                message: "password requires a username".to_string(),
            });
        }

        errors
    }
}

/// Maximum scan interval in seconds (1 hour).
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds between the end of one publish and the next scan.
    pub interval_seconds: u64,
    /// Which scanning tool to use.
    pub provider: ProviderKind,
    /// Wireless interface to scan on (nmcli and iwlist). Provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECS,
            provider: ProviderKind::Auto,
            interface: None,
        }
    }
}

impl ScanConfig {
    /// Validate scan configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_seconds == 0 {
            errors.push(ValidationError {
                field: "scan.interval_seconds".to_string(),
                message: "interval must be at least 1 second".to_string(),
            });
        } else if self.interval_seconds > MAX_INTERVAL_SECS {
            errors.push(ValidationError {
                field: "scan.interval_seconds".to_string(),
                message: format!(
                    "interval {} is too long (maximum {} seconds / 1 hour)",
                    self.interval_seconds, MAX_INTERVAL_SECS
                ),
            });
        }

        if let Some(interface) = &self.interface
            && interface.is_empty()
        {
            errors.push(ValidationError {
                field: "scan.interface".to_string(),
                message: "interface cannot be empty string (omit it instead)".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `mqtt.topic`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bssidcast")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mqtt.broker_uri, "tcp://test.mosquitto.org:1883");
        assert_eq!(config.mqtt.topic, "geoloc/wifi/bssids");
        assert_eq!(config.mqtt.qos, QoS::AtLeastOnce);
        assert_eq!(config.mqtt.connect_timeout, 10);
        assert_eq!(config.scan.interval_seconds, 5);
        assert_eq!(config.scan.provider, ProviderKind::Auto);
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [mqtt]
            broker_uri = "mqtts://broker.example.com"
            topic = "home/wifi"
            qos = 2
            client_id_prefix = "rooftop"
            keep_alive = 30
            connect_timeout = 5
            username = "scanner"
            password = "secret"

            [scan]
            interval_seconds = 30
            provider = "nmcli"
            interface = "wlp2s0"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.broker_uri, "mqtts://broker.example.com");
        assert_eq!(config.mqtt.qos, QoS::ExactlyOnce);
        assert_eq!(config.mqtt.client_id_prefix.as_deref(), Some("rooftop"));
        assert_eq!(config.mqtt.username.as_deref(), Some("scanner"));
        assert_eq!(config.scan.interval_seconds, 30);
        assert_eq!(config.scan.provider, ProviderKind::Nmcli);
        assert_eq!(config.scan.interface.as_deref(), Some("wlp2s0"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_toml_uses_defaults() {
        let toml = r#"
            [scan]
            interval_seconds = 15
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scan.interval_seconds, 15);
        assert_eq!(config.mqtt.topic, "geoloc/wifi/bssids");
        assert_eq!(config.scan.provider, ProviderKind::Auto);
    }

    #[test]
    fn test_config_rejects_unknown_qos() {
        let toml = r#"
            [mqtt]
            qos = 3
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            mqtt: MqttConfig {
                broker_uri: "tcp://localhost:1884".to_string(),
                topic: "test/bssids".to_string(),
                qos: QoS::AtMostOnce,
                ..MqttConfig::default()
            },
            scan: ScanConfig {
                interval_seconds: 42,
                provider: ProviderKind::Termux,
                interface: None,
            },
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.mqtt.broker_uri, "tcp://localhost:1884");
        assert_eq!(loaded.mqtt.topic, "test/bssids");
        assert_eq!(loaded.mqtt.qos, QoS::AtMostOnce);
        assert_eq!(loaded.mqtt.username, None);
        assert_eq!(loaded.scan.interval_seconds, 42);
        assert_eq!(loaded.scan.provider, ProviderKind::Termux);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_validated_rejects_bad_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[scan]\ninterval_seconds = 0\n").unwrap();

        let result = Config::load_validated(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("bssidcast/config.toml"));
    }

    #[test]
    fn test_scheduler_config_prefix_falls_back_to_label() {
        let config = Config::default();
        let scheduler = config.scheduler_config("linux");
        assert_eq!(scheduler.client_id_prefix, "linux");
        assert_eq!(scheduler.source_label, "linux");
        assert_eq!(scheduler.connect_timeout, Duration::from_secs(10));

        let mut config = Config::default();
        config.mqtt.client_id_prefix = Some("rooftop".to_string());
        let scheduler = config.scheduler_config("android");
        assert_eq!(scheduler.client_id_prefix, "rooftop");
        assert_eq!(scheduler.source_label, "android");
    }

    // ==========================================================================
    // Validation tests
    // ==========================================================================

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_topic_validation() {
        let empty = MqttConfig {
            topic: String::new(),
            ..MqttConfig::default()
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));

        for topic in ["geoloc/#", "geoloc/+/bssids"] {
            let wildcard = MqttConfig {
                topic: topic.to_string(),
                ..MqttConfig::default()
            };
            let errors = wildcard.validate();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].message.contains("wildcards"));
        }
    }

    #[test]
    fn test_broker_uri_validation() {
        for uri in ["http://localhost", "localhost:1883", "tcp://:1883", "tcp://host:99999"] {
            let config = MqttConfig {
                broker_uri: uri.to_string(),
                ..MqttConfig::default()
            };
            let errors = config.validate();
            assert_eq!(errors.len(), 1, "expected one error for {}", uri);
            assert_eq!(errors[0].field, "mqtt.broker_uri");
        }
    }

    #[test]
    fn test_mqtt_misc_validation() {
        let config = MqttConfig {
            connect_timeout: 0,
            password: Some("secret".to_string()),
            client_id_prefix: Some(String::new()),
            ..MqttConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "mqtt.connect_timeout"));
        assert!(errors.iter().any(|e| e.field == "mqtt.password"));
        assert!(errors.iter().any(|e| e.field == "mqtt.client_id_prefix"));
    }

    #[test]
    fn test_interval_validation() {
        let zero = ScanConfig {
            interval_seconds: 0,
            ..ScanConfig::default()
        };
        let errors = zero.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("at least 1 second"));

        let long = ScanConfig {
            interval_seconds: 7200,
            ..ScanConfig::default()
        };
        let errors = long.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("too long"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let errors = vec![
            ValidationError {
                field: "mqtt.topic".to_string(),
                message: "topic cannot be empty".to_string(),
            },
            ValidationError {
                field: "scan.interval_seconds".to_string(),
                message: "interval must be at least 1 second".to_string(),
            },
        ];
        let display = format!("{}", ConfigError::Validation(errors));
        assert!(display.contains("mqtt.topic"));
        assert!(display.contains("scan.interval_seconds"));
    }
}
