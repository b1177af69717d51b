//! Linux discovery through `/sys/class/tty`.

use crate::debug::debug_log;
use crate::error::{Error, Result};
use crate::port::{PortInfo, Transport, UsbInfo};
use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};

/// How far above the tty's `device` link USB attributes may live.
const USB_SEARCH_DEPTH: usize = 5;

/// `type` value of an 8250 slot with no UART behind it.
const PORT_UNKNOWN: libc::c_int = 0;

/// Kernel `struct serial_struct` from `<linux/serial.h>`.
#[repr(C)]
#[allow(dead_code)]
struct SerialStruct {
    kind: libc::c_int,
    line: libc::c_int,
    port: libc::c_uint,
    irq: libc::c_int,
    flags: libc::c_int,
    xmit_fifo_size: libc::c_int,
    custom_divisor: libc::c_int,
    baud_base: libc::c_int,
    close_delay: libc::c_ushort,
    io_type: libc::c_char,
    reserved_char: [libc::c_char; 1],
    hub6: libc::c_int,
    closing_wait: libc::c_ushort,
    closing_wait2: libc::c_ushort,
    iomem_base: *mut libc::c_uchar,
    iomem_reg_shift: libc::c_ushort,
    port_high: libc::c_uint,
    iomap_base: libc::c_ulong,
}

/// A tty class directory plus the device directory its names map to.
#[derive(Debug, Clone)]
pub(crate) struct SysfsTree {
    class_dir: PathBuf,
    dev_dir: PathBuf,
}

impl Default for SysfsTree {
    fn default() -> Self {
        Self::at("/sys/class/tty", "/dev")
    }
}

impl SysfsTree {
    pub(crate) fn at(class_dir: impl Into<PathBuf>, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            class_dir: class_dir.into(),
            dev_dir: dev_dir.into(),
        }
    }

    /// Device paths of every tty backed by real hardware.
    pub(crate) fn port_names(&self) -> Result<Vec<String>> {
        debug_log!("enumerating tty devices in {}", self.class_dir.display());
        let entries = fs::read_dir(&self.class_dir)
            .map_err(|err| Error::os("read_dir(/sys/class/tty)", err))?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let dev = entry.file_name().to_string_lossy().into_owned();
            let Some(target) = self.device_target(&dev) else {
                continue;
            };
            if target.contains("virtual") {
                continue;
            }
            let path = self.dev_dir.join(&dev);
            let path = path.to_string_lossy().into_owned();
            if target.contains("serial8250") && !probe_8250(&path) {
                debug_log!("{}: no UART behind serial8250 slot, skipping", path);
                continue;
            }
            debug_log!("found port {}", path);
            names.try_reserve(1)?;
            names.push(path);
        }
        names.sort();
        Ok(names)
    }

    /// Metadata for a device path such as `/dev/ttyUSB0`.
    ///
    /// `None` when the device has no tty class entry.
    pub(crate) fn describe(&self, name: &str) -> Option<PortInfo> {
        let dev = Path::new(name)
            .strip_prefix(&self.dev_dir)
            .ok()?
            .to_str()?;
        let target = self.device_target(dev)?;

        let transport = if target.contains("bluetooth") {
            Transport::Bluetooth
        } else if target.contains("usb") {
            Transport::Usb
        } else {
            Transport::Native
        };

        let device = self.class_dir.join(dev).join("device");
        let mut info = PortInfo {
            description: dev.to_string(),
            transport,
            ..PortInfo::default()
        };
        match transport {
            Transport::Usb => {
                if let Some(usb) = read_usb(&device) {
                    if let Some(product) = &usb.product {
                        info.description = product.clone();
                    }
                    if let Some(serial) = usb.serial.as_deref().filter(|s| !s.is_empty()) {
                        info.description = format!("{} - {}", info.description, serial);
                    }
                    info.usb = Some(usb);
                }
            }
            Transport::Bluetooth => {
                info.bluetooth_address = read_line(&device.join("address"));
            }
            Transport::Native => {}
        }
        Some(info)
    }

    /// Target of the class entry, or of its `device` link on kernels where
    /// class entries are plain directories.
    fn device_target(&self, dev: &str) -> Option<String> {
        let entry = self.class_dir.join(dev);
        let meta = fs::symlink_metadata(&entry).ok()?;
        let link = if meta.file_type().is_symlink() {
            entry
        } else {
            entry.join("device")
        };
        let target = fs::read_link(link).ok()?;
        Some(target.to_string_lossy().into_owned())
    }
}

fn read_line(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    Some(text.lines().next().unwrap_or("").to_string())
}

fn read_number(path: &Path, radix: u32) -> Option<u32> {
    u32::from_str_radix(read_line(path)?.trim(), radix).ok()
}

/// Walk up from the interface directory to the USB device directory.
fn read_usb(device: &Path) -> Option<UsbInfo> {
    let mut dir = device.to_path_buf();
    let mut interface = None;

    for _ in 0..USB_SEARCH_DEPTH {
        if interface.is_none() {
            interface = read_number(&dir.join("bInterfaceNumber"), 16).map(|n| n as u8);
        }
        dir.push("..");

        let Some(bus) = read_number(&dir.join("busnum"), 10) else {
            continue;
        };
        let Some(address) = read_number(&dir.join("devnum"), 10) else {
            continue;
        };
        let Some(vid) = read_number(&dir.join("idVendor"), 16) else {
            continue;
        };
        let Some(pid) = read_number(&dir.join("idProduct"), 16) else {
            continue;
        };

        return Some(UsbInfo {
            bus: u8::try_from(bus).ok(),
            address: u8::try_from(address).ok(),
            vid: u16::try_from(vid).ok(),
            pid: u16::try_from(pid).ok(),
            interface,
            manufacturer: read_line(&dir.join("manufacturer")),
            product: read_line(&dir.join("product")),
            serial: read_line(&dir.join("serial")),
        });
    }
    None
}

/// serial8250 registers a fixed number of slots; only a successful
/// `TIOCGSERIAL` with a known UART type means hardware is present.
fn probe_8250(path: &str) -> bool {
    let Ok(cpath) = CString::new(path) else {
        return false;
    };
    let flags = libc::O_RDWR | libc::O_NONBLOCK | libc::O_NOCTTY | libc::O_CLOEXEC;
    let fd = unsafe { libc::open(cpath.as_ptr(), flags) };
    if fd < 0 {
        return false;
    }
    let mut serial: SerialStruct = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGSERIAL, &mut serial as *mut SerialStruct) };
    unsafe { libc::close(fd) };
    rc == 0 && serial.kind != PORT_UNKNOWN
}
