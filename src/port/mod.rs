//! Serial port handles.
//!
//! A [`Port`] names one device and carries its metadata. It holds an OS
//! handle only between [`Port::open`] and [`Port::close`]; dropping an open
//! port closes it.

pub mod info;
mod io;
pub mod traits;

pub use info::{PortInfo, Transport, UsbInfo};
pub use traits::*;

use crate::debug::debug_log;
use crate::enumerate;
use crate::error::{Error, Result};
use crate::sys::{self, RawHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Access mode requested from [`Port::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Read,
    Write,
    ReadWrite,
}

/// Which OS queue to discard in [`Port::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Buffer {
    Input,
    Output,
    Both,
}

/// Modem status lines reported by [`Port::signals`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signals(u8);

impl Signals {
    pub const CTS: Signals = Signals(1);
    pub const DSR: Signals = Signals(2);
    /// Data carrier detect.
    pub const DCD: Signals = Signals(4);
    /// Ring indicator.
    pub const RI: Signals = Signals(8);

    pub const fn empty() -> Self {
        Signals(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Signals) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Signals {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Signals(self.0 | rhs.0)
    }
}

impl BitOrAssign for Signals {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Signals::CTS, "CTS"),
            (Signals::DSR, "DSR"),
            (Signals::DCD, "DCD"),
            (Signals::RI, "RI"),
        ]
        .iter()
        .filter(|(s, _)| self.contains(*s))
        .map(|(_, n)| *n)
        .collect();
        write!(f, "Signals({})", names.join(" | "))
    }
}

/// One serial device, open or closed.
pub struct Port {
    name: String,
    info: PortInfo,
    handle: Option<sys::Handle>,
}

impl Port {
    /// Look up a port by its OS name (`/dev/ttyUSB0`, `COM3`).
    ///
    /// On POSIX the path is canonicalized first, so symlinks such as
    /// `/dev/serial/by-id/...` resolve to the real device. Metadata is read
    /// eagerly; a device whose metadata cannot be read is reported as a
    /// native port.
    ///
    /// # Example
    /// ```no_run
    /// use serialio::Port;
    ///
    /// let port = Port::by_name("/dev/ttyUSB0")?;
    /// println!("{}: {}", port.name(), port.description());
    /// # Ok::<(), serialio::Error>(())
    /// ```
    pub fn by_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid("empty port name"));
        }
        let name = resolve_name(name)?;
        let info = enumerate::describe(&name);
        debug_log!("port {} is {} ({})", name, info.description, info.transport);
        Ok(Self::with_info(name, info))
    }

    pub(crate) fn with_info(name: impl Into<String>, info: PortInfo) -> Self {
        Self {
            name: name.into(),
            info,
            handle: None,
        }
    }

    /// A new closed port for the same device, with freshly read metadata.
    pub fn copy_closed(&self) -> Result<Self> {
        Self::by_name(&self.name)
    }

    /// Open the device with exclusive access.
    ///
    /// The line is switched to raw mode (no echo, no translation, no
    /// signal characters) and a zero baud rate is replaced with 9600.
    pub fn open(&mut self, mode: Mode) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::invalid(format!("port {} is already open", self.name)));
        }
        debug_log!("opening {} ({:?})", self.name, mode);
        self.handle = Some(sys::Handle::open(&self.name, mode)?);
        Ok(())
    }

    /// Close the OS handle. Closing a port that is not open is an error.
    pub fn close(&mut self) -> Result<()> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| Error::invalid(format!("port {} is not open", self.name)))?;
        debug_log!("closing {}", self.name);
        handle.close()
    }

    /// Drop the port, closing it if still open.
    pub fn release(self) {}

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn transport(&self) -> Transport {
        self.info.transport
    }

    /// All metadata at once.
    pub fn info(&self) -> &PortInfo {
        &self.info
    }

    /// The OS handle (file descriptor or `HANDLE`) of an open port.
    pub fn raw_handle(&self) -> Result<RawHandle> {
        Ok(self.open_handle()?.raw())
    }

    fn usb(&self) -> Result<&UsbInfo> {
        self.info
            .usb
            .as_ref()
            .ok_or_else(|| Error::invalid(format!("port {} is not a USB device", self.name)))
    }

    /// USB bus number and device address.
    pub fn usb_bus_address(&self) -> Result<(u8, u8)> {
        let usb = self.usb()?;
        match (usb.bus, usb.address) {
            (Some(bus), Some(address)) => Ok((bus, address)),
            _ => Err(Error::unsupported("USB bus/address for this port")),
        }
    }

    /// USB vendor and product IDs.
    pub fn usb_vid_pid(&self) -> Result<(u16, u16)> {
        let usb = self.usb()?;
        match (usb.vid, usb.pid) {
            (Some(vid), Some(pid)) => Ok((vid, pid)),
            _ => Err(Error::unsupported("USB VID/PID for this port")),
        }
    }

    /// USB interface number of the serial function.
    pub fn usb_interface_number(&self) -> Result<u8> {
        self.usb()?
            .interface
            .ok_or_else(|| Error::unsupported("USB interface number for this port"))
    }

    pub fn usb_manufacturer(&self) -> Option<&str> {
        self.info.usb.as_ref()?.manufacturer.as_deref()
    }

    pub fn usb_product(&self) -> Option<&str> {
        self.info.usb.as_ref()?.product.as_deref()
    }

    pub fn usb_serial(&self) -> Option<&str> {
        self.info.usb.as_ref()?.serial.as_deref()
    }

    pub fn bluetooth_address(&self) -> Option<&str> {
        self.info.bluetooth_address.as_deref()
    }

    pub(crate) fn handle(&self) -> Option<&sys::Handle> {
        self.handle.as_ref()
    }

    fn open_handle(&self) -> Result<&sys::Handle> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::invalid(format!("port {} is not open", self.name)))
    }

    fn open_handle_mut(&mut self) -> Result<&mut sys::Handle> {
        match self.handle.as_mut() {
            Some(handle) => Ok(handle),
            None => Err(Error::invalid(format!("port {} is not open", self.name))),
        }
    }

    /// Read the live line settings. Fields that cannot be decoded
    /// unambiguously are left unset.
    pub fn config(&self) -> Result<PortConfiguration> {
        self.open_handle()?.read_config()
    }

    /// Apply every set field of `config`.
    ///
    /// Validation failures (`InvalidArgument`, `Unsupported`) leave the
    /// device untouched. An OS failure after validation may leave it
    /// partially configured.
    pub fn set_config(&mut self, config: &PortConfiguration) -> Result<()> {
        let handle = self.open_handle_mut()?;
        handle.apply_config(config)
    }

    /// Read, change one field, apply.
    fn update_config(&mut self, change: impl FnOnce(&mut PortConfiguration)) -> Result<()> {
        let mut config = self.config()?;
        change(&mut config);
        self.set_config(&config)
    }

    pub fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        self.update_config(|c| c.baudrate = Some(baudrate))
    }

    pub fn set_bits(&mut self, bits: u8) -> Result<()> {
        self.update_config(|c| c.bits = Some(bits))
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        self.update_config(|c| c.parity = Some(parity))
    }

    pub fn set_stopbits(&mut self, stopbits: u8) -> Result<()> {
        self.update_config(|c| c.stopbits = Some(stopbits))
    }

    pub fn set_rts(&mut self, rts: Rts) -> Result<()> {
        self.update_config(|c| c.rts = Some(rts))
    }

    pub fn set_cts(&mut self, cts: Cts) -> Result<()> {
        self.update_config(|c| c.cts = Some(cts))
    }

    pub fn set_dtr(&mut self, dtr: Dtr) -> Result<()> {
        self.update_config(|c| c.dtr = Some(dtr))
    }

    pub fn set_dsr(&mut self, dsr: Dsr) -> Result<()> {
        self.update_config(|c| c.dsr = Some(dsr))
    }

    pub fn set_xon_xoff(&mut self, xon_xoff: XonXoff) -> Result<()> {
        self.update_config(|c| c.xon_xoff = Some(xon_xoff))
    }

    /// Apply a flow control preset on top of the live settings.
    pub fn set_flowcontrol(&mut self, flowcontrol: FlowControl) -> Result<()> {
        self.update_config(|c| c.set_flowcontrol(flowcontrol))
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.close() {
                tracing::warn!("closing {} on drop failed: {}", self.name, err);
            }
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("transport", &self.info.transport)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(unix)]
fn resolve_name(name: &str) -> Result<String> {
    let path = std::fs::canonicalize(name)
        .map_err(|err| Error::invalid(format!("cannot resolve {}: {}", name, err)))?;
    path.into_os_string()
        .into_string()
        .map_err(|_| Error::invalid(format!("{} is not valid UTF-8", name)))
}

#[cfg(not(unix))]
fn resolve_name(name: &str) -> Result<String> {
    Ok(name.to_string())
}
