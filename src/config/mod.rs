//! Configuration for the `serialio` tool and hardware tests.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `SERIALIO_CONFIG` environment variable (explicit path)
//! 2. `./serialio.toml` (current directory)
//! 3. `serialio.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any value can be overridden with `SERIALIO_<SECTION>_<KEY>`:
//! - `SERIALIO_SERIAL_DEFAULT_BAUD=115200`
//! - `SERIALIO_LOGGING_FORMAT=json`
//! - `SERIALIO_TESTING_PORT=/dev/ttyUSB0`
//!
//! The legacy test variables `TEST_PORT`, `TEST_PEER_PORT`, `TEST_BAUD` and
//! `TEST_LOOPBACK` are honored too.
//!
//! # Example
//!
//! ```no_run
//! use serialio::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Default baud: {}", loader.config().serial.default_baud);
//! # Ok::<(), serialio::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, TestingConfig};
