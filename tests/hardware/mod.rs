//! Hardware-specific tests requiring real serial devices.
//!
//! These tests are ignored unless the `hardware-tests` feature is enabled,
//! and skip themselves when the environment names no device.
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0          # or COM3
//! export TEST_PEER_PORT=/dev/ttyUSB1     # optional, null-modem partner
//! export TEST_BAUD=115200                # optional
//! export TEST_LOOPBACK=1                 # if TEST_PORT has TX wired to RX
//!
//! cargo test --features hardware-tests --test integration_hardware
//! ```

pub mod discovery_tests;
pub mod transfer_tests;
pub mod utils;
