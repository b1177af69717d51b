//! Descriptive port metadata, resolved once when a [`Port`](super::Port) is created.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical or logical connection class of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// On-board UART, PCI card or anything not otherwise classified.
    #[default]
    Native,
    Usb,
    Bluetooth,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transport::Native => "native",
            Transport::Usb => "usb",
            Transport::Bluetooth => "bluetooth",
        })
    }
}

/// USB attributes. Each field is `None` when the OS does not expose it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbInfo {
    pub bus: Option<u8>,
    pub address: Option<u8>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub interface: Option<u8>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// Everything known about a port besides its name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub description: String,
    pub transport: Transport,
    pub usb: Option<UsbInfo>,
    pub bluetooth_address: Option<String>,
}

impl PortInfo {
    /// Plain native port described by the last path component of `name`.
    pub fn native(name: &str) -> Self {
        Self {
            description: basename(name).to_string(),
            ..Self::default()
        }
    }
}

/// Last `/` or `\` separated component of a device name.
pub(crate) fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_description() {
        let info = PortInfo::native("/dev/ttyS0");
        assert_eq!(info.description, "ttyS0");
        assert_eq!(info.transport, Transport::Native);
        assert!(info.usb.is_none());
        assert_eq!(PortInfo::native("COM3").description, "COM3");
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Usb.to_string(), "usb");
        assert_eq!(
            serde_json::to_string(&Transport::Bluetooth).unwrap(),
            "\"bluetooth\""
        );
    }
}
