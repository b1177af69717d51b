//! Configuration schema definitions.
//!
//! All sections use `#[serde(default)]`, so a file only needs the keys it
//! changes.

use crate::port::PortConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied by the command line tool
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Hardware test configuration
    pub testing: TestingConfig,
}

impl Config {
    /// Reject values no port could accept.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.default_baud == 0 {
            return Err(ConfigError::validation("serial.default_baud", "must be non-zero"));
        }
        if self.testing.baud == 0 {
            return Err(ConfigError::validation("testing.baud", "must be non-zero"));
        }
        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error" | "off"
        ) {
            return Err(ConfigError::validation(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        Ok(())
    }
}

/// Serial defaults section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate applied when a command does not give one
    pub default_baud: u32,
    /// Timeout for blocking operations, 0 waits forever
    pub default_timeout_ms: u32,
    /// Short names for long device paths
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 9600,
            default_timeout_ms: 1000,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.default_timeout_ms))
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Line settings to apply right after opening a port.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration::new().with_baudrate(self.default_baud)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    /// Install the stderr debug handler for low-level port tracing
    pub debug_sink: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            debug_sink: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Hardware test configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Port under test
    pub port: Option<String>,
    /// Second port wired to `port` by a null-modem cable
    pub peer_port: Option<String>,
    pub baud: u32,
    /// Whether TX is jumpered to RX on `port`
    pub loopback_enabled: bool,
    pub timeout_ms: u32,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            peer_port: None,
            baud: 115200,
            loopback_enabled: false,
            timeout_ms: 2000,
        }
    }
}

impl TestingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.default_baud, 9600);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.testing.port.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("arduino".to_string(), "/dev/ttyACM0".to_string());

        assert_eq!(config.resolve_port("arduino"), "/dev/ttyACM0");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_port_configuration_from_defaults() {
        let serial = SerialConfig {
            default_baud: 57600,
            ..SerialConfig::default()
        };
        let cfg = serial.port_configuration();
        assert_eq!(cfg.baudrate, Some(57600));
        assert_eq!(cfg.bits, None);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            default_baud = 115200

            [serial.port_aliases]
            gps = "/dev/ttyUSB1"

            [logging]
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.default_baud, 115200);
        assert_eq!(config.serial.resolve_port("gps"), "/dev/ttyUSB1");
        assert_eq!(config.logging.format, LogFormat::Json);
        // untouched sections keep defaults
        assert_eq!(config.testing.baud, 115200);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.serial.default_baud = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }
}
