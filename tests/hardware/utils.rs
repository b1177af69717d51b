//! Helpers for hardware tests.

use serialio::config::ConfigLoader;
use serialio::{FlowControl, Mode, Parity, Port, PortConfiguration};
use std::time::{Duration, Instant};

/// Test devices as named by `TEST_*` / `SERIALIO_TESTING_*` variables.
pub struct TestPortConfig {
    pub port_name: String,
    pub peer_name: Option<String>,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
    pub timeout_ms: u32,
}

impl TestPortConfig {
    /// `None` when no test port is configured.
    pub fn from_env() -> Option<Self> {
        let testing = ConfigLoader::with_defaults().into_config().testing;
        let port_name = testing.port?;
        Some(Self {
            port_name,
            peer_name: testing.peer_port,
            baud_rate: testing.baud,
            loopback_enabled: testing.loopback_enabled,
            timeout_ms: testing.timeout_ms,
        })
    }

    /// 8N1 at the configured rate, no flow control.
    pub fn line(&self) -> PortConfiguration {
        PortConfiguration::new()
            .with_baudrate(self.baud_rate)
            .with_bits(8)
            .with_parity(Parity::None)
            .with_stopbits(1)
            .with_flowcontrol(FlowControl::None)
    }

    pub fn open(&self, name: &str) -> Port {
        let mut port = Port::by_name(name).unwrap_or_else(|e| panic!("lookup {}: {}", name, e));
        port.open(Mode::ReadWrite)
            .unwrap_or_else(|e| panic!("open {}: {}", name, e));
        port.set_config(&self.line())
            .unwrap_or_else(|e| panic!("configure {}: {}", name, e));
        port
    }
}

/// Skip the calling test when no hardware is configured.
pub fn skip_without_hardware() -> Option<TestPortConfig> {
    let cfg = TestPortConfig::from_env();
    if cfg.is_none() {
        println!("Skipping hardware test: TEST_PORT not set");
    }
    cfg
}

/// Time `f` and return its result with the elapsed duration.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}
