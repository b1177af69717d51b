//! Discovery of the serial ports present on this machine.

#[cfg(target_os = "linux")]
mod sysfs;

#[cfg(any(windows, target_os = "macos"))]
mod native;

use crate::error::Result;
use crate::port::{Port, PortInfo};

/// Every serial port currently present, with metadata resolved.
///
/// A machine with no serial hardware yields an empty list. Platforms with
/// no discovery mechanism report [`Unsupported`](crate::ErrorKind::Unsupported).
///
/// # Example
/// ```no_run
/// for port in serialio::list_ports()? {
///     println!("{:<20} {}", port.name(), port.description());
/// }
/// # Ok::<(), serialio::Error>(())
/// ```
pub fn list_ports() -> Result<Vec<Port>> {
    let names = port_names()?;
    let mut ports = Vec::new();
    ports.try_reserve(names.len())?;
    for name in names {
        let info = describe(&name);
        ports.push(Port::with_info(name, info));
    }
    tracing::debug!("found {} serial ports", ports.len());
    Ok(ports)
}

#[cfg(target_os = "linux")]
fn port_names() -> Result<Vec<String>> {
    sysfs::SysfsTree::default().port_names()
}

#[cfg(any(windows, target_os = "macos"))]
fn port_names() -> Result<Vec<String>> {
    native::port_names()
}

#[cfg(not(any(target_os = "linux", windows, target_os = "macos")))]
fn port_names() -> Result<Vec<String>> {
    Err(crate::error::Error::unsupported("port enumeration on this platform"))
}

/// Metadata for one device. Lookup failures fall back to a native port
/// described by its base name.
pub(crate) fn describe(name: &str) -> PortInfo {
    lookup(name).unwrap_or_else(|| {
        tracing::warn!("no metadata for {}, treating it as a native port", name);
        PortInfo::native(name)
    })
}

#[cfg(target_os = "linux")]
fn lookup(name: &str) -> Option<PortInfo> {
    sysfs::SysfsTree::default().describe(name)
}

#[cfg(any(windows, target_os = "macos"))]
fn lookup(name: &str) -> Option<PortInfo> {
    native::describe(name)
}

#[cfg(not(any(target_os = "linux", windows, target_os = "macos")))]
fn lookup(_name: &str) -> Option<PortInfo> {
    None
}
