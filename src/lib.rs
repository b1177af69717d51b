//! Cross-platform serial port access.
//!
//! `serialio` finds serial devices, opens them with exclusive access,
//! configures the line (baud rate, framing, flow control, modem lines) and
//! moves bytes with blocking, non-blocking or timed calls. Several ports can
//! be waited on at once through an [`EventSet`].
//!
//! All calls run synchronously on the calling thread. A [`Port`] is not
//! internally synchronized; different ports may be used from different
//! threads freely.
//!
//! # Modules
//!
//! - `port`: the [`Port`] handle, line configuration and transfers
//! - `enumerate`: discovery of present devices
//! - `event`: multi-port readiness waits
//! - `timing`: monotonic deadlines used by blocking calls
//! - `error`: error kinds and OS error reporting
//! - `debug`: pluggable debug sink
//! - `config` / `logging`: settings and subscriber setup for the `serialio` tool
//!
//! # Example
//!
//! ```no_run
//! use serialio::{Mode, Port, PortConfiguration, Parity};
//!
//! let mut port = Port::by_name("/dev/ttyUSB0")?;
//! port.open(Mode::ReadWrite)?;
//! port.set_config(
//!     &PortConfiguration::new()
//!         .with_baudrate(115_200)
//!         .with_bits(8)
//!         .with_parity(Parity::None)
//!         .with_stopbits(1),
//! )?;
//! port.blocking_write(b"AT\r", 1000)?;
//! let mut reply = [0u8; 64];
//! let n = port.blocking_read_next(&mut reply, 1000)?;
//! println!("{:?}", &reply[..n]);
//! # Ok::<(), serialio::Error>(())
//! ```

pub mod config;
pub mod debug;
pub mod enumerate;
pub mod error;
pub mod event;
pub mod logging;
pub mod port;
mod sys;
pub mod timing;

pub use debug::{default_debug_handler, set_debug_handler, stderr_debug_handler};
pub use enumerate::list_ports;
pub use error::{last_error_code, last_error_message, Error, ErrorKind, Result};
pub use event::{EventMask, EventSet};
pub use port::{
    Buffer, Cts, Dsr, Dtr, FlowControl, Mode, Parity, Port, PortConfiguration, PortInfo, Rts,
    Signals, Transport, UsbInfo, XonXoff,
};
pub use sys::RawHandle;

/// Library version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

/// Version of the library as compiled.
pub fn version() -> Version {
    Version {
        major: parse_component(env!("CARGO_PKG_VERSION_MAJOR")),
        minor: parse_component(env!("CARGO_PKG_VERSION_MINOR")),
        micro: parse_component(env!("CARGO_PKG_VERSION_PATCH")),
    }
}

/// Full version string, including any pre-release suffix.
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn parse_component(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}
