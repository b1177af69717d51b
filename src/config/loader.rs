//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIALIO";

const CONFIG_FILE_NAME: &str = "serialio.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIALIO_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIALIO_CONFIG` environment variable (explicit path)
    /// 2. `./serialio.toml` (current directory)
    /// 3. `serialio.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values in every case.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Defaults plus environment overrides; unparsable overrides are skipped.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(err) = apply_env_overrides(&mut config) {
            tracing::warn!("ignoring environment overrides: {}", err);
        }

        Self {
            config_path: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory (`~/.config/serialio`, `%APPDATA%\serialio\config`, ...).
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serialio").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!("loaded configuration from {}", path.display());

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// First set variable among `SERIALIO_<key>` and the legacy names.
fn env_value(key: &str, legacy: &[&str]) -> Option<(String, String)> {
    let primary = format!("{}_{}", ENV_PREFIX, key);
    std::iter::once(primary)
        .chain(legacy.iter().map(|s| s.to_string()))
        .find_map(|var| std::env::var(&var).ok().map(|val| (var, val)))
}

fn parse_env<T: FromStr>(var: &str, val: &str, what: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {}: '{}'", what, val)))
}

fn parse_bool(var: &str, val: &str) -> ConfigResult<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(var, format!("Invalid boolean: '{}'", val))),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `SERIALIO_<SECTION>_<KEY>`, e.g.
/// `SERIALIO_SERIAL_DEFAULT_BAUD=115200` or `SERIALIO_TESTING_PORT=/dev/ttyUSB0`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some((var, val)) = env_value("SERIAL_DEFAULT_BAUD", &[]) {
        config.serial.default_baud = parse_env(&var, &val, "baud rate")?;
    }
    if let Some((var, val)) = env_value("SERIAL_DEFAULT_TIMEOUT_MS", &[]) {
        config.serial.default_timeout_ms = parse_env(&var, &val, "timeout")?;
    }

    if let Some((_, val)) = env_value("LOGGING_LEVEL", &[]) {
        config.logging.level = val;
    }
    if let Some((var, val)) = env_value("LOGGING_FORMAT", &[]) {
        config.logging.format = val
            .parse()
            .map_err(|msg: String| ConfigError::env_parse(var, msg))?;
    }
    if let Some((var, val)) = env_value("LOGGING_DEBUG_SINK", &[]) {
        config.logging.debug_sink = parse_bool(&var, &val)?;
    }

    // Testing overrides also accept the legacy TEST_* names
    if let Some((_, val)) = env_value("TESTING_PORT", &["TEST_PORT"]) {
        config.testing.port = Some(val);
    }
    if let Some((_, val)) = env_value("TESTING_PEER_PORT", &["TEST_PEER_PORT"]) {
        config.testing.peer_port = Some(val);
    }
    if let Some((var, val)) = env_value("TESTING_BAUD", &["TEST_BAUD"]) {
        config.testing.baud = parse_env(&var, &val, "baud rate")?;
    }
    if let Some((var, val)) = env_value("TESTING_TIMEOUT_MS", &["TEST_TIMEOUT"]) {
        config.testing.timeout_ms = parse_env(&var, &val, "timeout")?;
    }
    if let Some((var, val)) = env_value("TESTING_LOOPBACK_ENABLED", &["TEST_LOOPBACK", "LOOPBACK_ENABLED"]) {
        config.testing.loopback_enabled = parse_bool(&var, &val)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 9600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("SERIALIO_SERIAL_DEFAULT_BAUD", "19200");
        env::set_var("SERIALIO_LOGGING_FORMAT", "json");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 19200);
        assert_eq!(loader.config().logging.format, LogFormat::Json);

        env::remove_var("SERIALIO_SERIAL_DEFAULT_BAUD");
        env::remove_var("SERIALIO_LOGGING_FORMAT");
    }

    #[test]
    #[serial]
    fn test_legacy_test_port_env() {
        env::set_var("TEST_PORT", "/dev/ttyUSB9");
        env::set_var("TEST_PEER_PORT", "/dev/ttyUSB8");
        env::set_var("TEST_BAUD", "57600");
        env::set_var("TEST_LOOPBACK", "1");

        let loader = ConfigLoader::with_defaults();
        let testing = &loader.config().testing;
        assert_eq!(testing.port.as_deref(), Some("/dev/ttyUSB9"));
        assert_eq!(testing.peer_port.as_deref(), Some("/dev/ttyUSB8"));
        assert_eq!(testing.baud, 57600);
        assert!(testing.loopback_enabled);

        env::remove_var("TEST_PORT");
        env::remove_var("TEST_PEER_PORT");
        env::remove_var("TEST_BAUD");
        env::remove_var("TEST_LOOPBACK");
    }

    #[test]
    #[serial]
    fn test_bad_env_value_is_reported() {
        env::set_var("SERIALIO_TESTING_BAUD", "fast");
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
        env::remove_var("SERIALIO_TESTING_BAUD");
    }

    #[test]
    #[serial]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut loader = ConfigLoader::with_defaults();
        loader.config_mut().serial.default_baud = 38400;
        loader
            .config_mut()
            .serial
            .port_aliases
            .insert("modem".into(), "/dev/ttyS1".into());
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(reloaded.config().serial.default_baud, 38400);
        assert_eq!(reloaded.config().serial.resolve_port("modem"), "/dev/ttyS1");
        assert_eq!(reloaded.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    #[serial]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from("/nonexistent/serialio.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    #[serial]
    fn test_explicit_config_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[serial]\ndefault_timeout_ms = 250\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, &path);

        assert_eq!(resolve_config_path().as_deref(), Some(path.as_path()));
        let loader = ConfigLoader::load().unwrap();
        assert_eq!(loader.config().serial.default_timeout_ms, 250);

        env::remove_var(CONFIG_PATH_ENV);
    }
}
