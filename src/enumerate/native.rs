//! macOS and Windows discovery through the `serialport` crate's IOKit and
//! SetupAPI walkers.
//!
//! VID/PID values on Windows come from hardware ID strings and are best effort.

use crate::error::{Error, Result};
use crate::port::info::basename;
use crate::port::{PortInfo, Transport, UsbInfo};
use serialport::{SerialPortInfo, SerialPortType};
use std::io;

fn available() -> Result<Vec<SerialPortInfo>> {
    serialport::available_ports()
        .map_err(|err| Error::os("enumerate ports", io::Error::new(io::ErrorKind::Other, err)))
}

pub(crate) fn port_names() -> Result<Vec<String>> {
    Ok(available()?.into_iter().map(|p| p.port_name).collect())
}

pub(crate) fn describe(name: &str) -> Option<PortInfo> {
    let found = available().ok()?.into_iter().find(|p| p.port_name == name)?;
    Some(to_info(&found))
}

fn to_info(port: &SerialPortInfo) -> PortInfo {
    let mut info = PortInfo::native(&port.port_name);
    match &port.port_type {
        SerialPortType::UsbPort(usb) => {
            info.transport = Transport::Usb;
            if let Some(product) = &usb.product {
                info.description = product.clone();
            }
            info.usb = Some(UsbInfo {
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
                serial: usb.serial_number.clone(),
                ..UsbInfo::default()
            });
        }
        SerialPortType::BluetoothPort => info.transport = Transport::Bluetooth,
        SerialPortType::PciPort | SerialPortType::Unknown => {
            info.description = basename(&port.port_name).to_string();
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_usb_port_mapping() {
        let port = SerialPortInfo {
            port_name: "COM7".into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x10c4,
                pid: 0xea60,
                serial_number: Some("0001".into()),
                manufacturer: Some("Silicon Labs".into()),
                product: Some("CP2102 USB to UART Bridge Controller".into()),
            }),
        };
        let info = to_info(&port);
        assert_eq!(info.transport, Transport::Usb);
        assert_eq!(info.description, "CP2102 USB to UART Bridge Controller");
        let usb = info.usb.unwrap();
        assert_eq!((usb.vid, usb.pid), (Some(0x10c4), Some(0xea60)));
        assert_eq!(usb.bus, None);
    }

    #[test]
    fn test_pci_port_is_native() {
        let port = SerialPortInfo {
            port_name: "/dev/cu.Bluetooth-Incoming-Port".into(),
            port_type: SerialPortType::PciPort,
        };
        let info = to_info(&port);
        assert_eq!(info.transport, Transport::Native);
        assert_eq!(info.description, "cu.Bluetooth-Incoming-Port");
    }
}
