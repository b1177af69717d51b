//! termios translation for POSIX targets.
//!
//! Linux with glibc goes through `termios2` so any integer baud rate
//! can be requested with `BOTHER`. macOS keeps a standard rate in termios
//! and sets anything else with `IOSSIOSPEED` after the termios commit.
//! Every other target is limited to the standard rate table.

use crate::error::{Error, Result};
use crate::port::{Cts, Dsr, Dtr, LineConfig, Parity, PortConfiguration, Rts, XonXoff};
use libc::c_int;
use std::os::unix::io::RawFd;

pub(crate) use speed::NativeTermios;

/// Native line state: the termios block plus the modem control bits that
/// were readable when it was captured.
#[derive(Clone)]
pub(crate) struct PosixLineConfig {
    pub(crate) termios: NativeTermios,
    /// `None` when the device has no modem lines (pseudo-terminals).
    pub(crate) modem: Option<c_int>,
    /// Baud rate to set after the termios commit (macOS custom rates).
    #[cfg_attr(not(any(target_os = "macos", target_os = "ios")), allow(dead_code))]
    pub(crate) custom_speed: Option<u32>,
}

impl PosixLineConfig {
    pub(crate) fn read(fd: RawFd) -> Result<Self> {
        let termios = speed::get_termios(fd)?;
        let modem = read_modem_bits(fd)?;
        Ok(Self {
            termios,
            modem,
            custom_speed: None,
        })
    }

    /// Strip all input/output processing for a raw byte stream.
    pub(crate) fn make_raw(&mut self) {
        let t = &mut self.termios;
        t.c_iflag &= !(libc::IGNBRK
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL);
        #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
        {
            t.c_iflag &= !libc::IMAXBEL;
        }
        t.c_oflag &= !(libc::OPOST | libc::ONLCR | libc::OCRNL | libc::ONOCR | libc::ONLRET);
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            t.c_oflag &= !(libc::NLDLY
                | libc::CRDLY
                | libc::TABDLY
                | libc::BSDLY
                | libc::VTDLY
                | libc::FFDLY
                | libc::OFILL);
        }
        t.c_lflag &= !(libc::ISIG | libc::ICANON | libc::ECHO | libc::IEXTEN);
        t.c_cc[libc::VMIN] = 0;
        t.c_cc[libc::VTIME] = 0;
        t.c_cflag |= libc::CLOCAL | libc::CREAD;
        t.c_cflag &= !libc::HUPCL;
    }

    /// Modem bits to raise and to lower for the RTS/DTR levels in `config`.
    pub(crate) fn modem_changes(config: &PortConfiguration) -> (c_int, c_int) {
        let mut raise = 0;
        let mut lower = 0;
        match config.rts {
            Some(Rts::On) => raise |= libc::TIOCM_RTS,
            Some(Rts::Off) => lower |= libc::TIOCM_RTS,
            _ => {}
        }
        match config.dtr {
            Some(Dtr::On) => raise |= libc::TIOCM_DTR,
            Some(Dtr::Off) => lower |= libc::TIOCM_DTR,
            _ => {}
        }
        (raise, lower)
    }
}

impl LineConfig for PosixLineConfig {
    fn decode(&self) -> PortConfiguration {
        let t = &self.termios;
        let mut config = PortConfiguration::new();

        config.baudrate = speed::read_speed(t);

        config.bits = Some(match t.c_cflag & libc::CSIZE {
            libc::CS5 => 5,
            libc::CS6 => 6,
            libc::CS7 => 7,
            _ => 8,
        });

        let parenb = t.c_cflag & libc::PARENB != 0;
        let ignpar = t.c_iflag & libc::IGNPAR != 0;
        config.parity = if !parenb && ignpar {
            Some(Parity::None)
        } else if !parenb || ignpar {
            None
        } else {
            let odd = t.c_cflag & libc::PARODD != 0;
            Some(match (has_cmspar(t), odd) {
                (true, true) => Parity::Mark,
                (true, false) => Parity::Space,
                (false, true) => Parity::Odd,
                (false, false) => Parity::Even,
            })
        };

        config.stopbits = Some(if t.c_cflag & libc::CSTOPB != 0 { 2 } else { 1 });

        if t.c_cflag & libc::CRTSCTS != 0 {
            config.rts = Some(Rts::FlowControl);
            config.cts = Some(Cts::FlowControl);
        } else {
            config.rts = self.modem.map(|bits| {
                if bits & libc::TIOCM_RTS != 0 {
                    Rts::On
                } else {
                    Rts::Off
                }
            });
            config.cts = Some(Cts::Ignore);
        }

        config.dtr = self.modem.map(|bits| {
            if bits & libc::TIOCM_DTR != 0 {
                Dtr::On
            } else {
                Dtr::Off
            }
        });
        config.dsr = Some(Dsr::Ignore);

        let ixoff = t.c_iflag & libc::IXOFF != 0;
        let ixon = t.c_iflag & libc::IXON != 0;
        config.xon_xoff = Some(match (ixoff, ixon) {
            (true, true) => XonXoff::InOut,
            (true, false) => XonXoff::In,
            (false, true) => XonXoff::Out,
            (false, false) => XonXoff::Disabled,
        });

        config
    }

    fn encode(&mut self, config: &PortConfiguration) -> Result<()> {
        config.validate()?;
        // work on a copy so a rejected field leaves self untouched
        let mut t = self.termios;
        let mut custom_speed = None;

        if let Some(baud) = config.baudrate {
            custom_speed = speed::write_speed(&mut t, baud)?;
        }

        if let Some(bits) = config.bits {
            t.c_cflag &= !libc::CSIZE;
            t.c_cflag |= match bits {
                5 => libc::CS5,
                6 => libc::CS6,
                7 => libc::CS7,
                _ => libc::CS8,
            };
        }

        if let Some(parity) = config.parity {
            t.c_iflag &= !libc::IGNPAR;
            t.c_cflag &= !(libc::PARENB | libc::PARODD);
            clear_cmspar(&mut t);
            match parity {
                Parity::None => t.c_iflag |= libc::IGNPAR,
                Parity::Even => t.c_cflag |= libc::PARENB,
                Parity::Odd => t.c_cflag |= libc::PARENB | libc::PARODD,
                Parity::Mark => {
                    set_cmspar(&mut t, "mark")?;
                    t.c_cflag |= libc::PARENB | libc::PARODD;
                }
                Parity::Space => {
                    set_cmspar(&mut t, "space")?;
                    t.c_cflag |= libc::PARENB;
                }
            }
        }

        if let Some(stopbits) = config.stopbits {
            if stopbits == 2 {
                t.c_cflag |= libc::CSTOPB;
            } else {
                t.c_cflag &= !libc::CSTOPB;
            }
        }

        if config.rts.is_some() || config.cts.is_some() {
            let current = t.c_cflag & libc::CRTSCTS != 0;
            let rts_flow = config.rts.map_or(current, |r| r == Rts::FlowControl);
            let cts_flow = config.cts.map_or(current, |c| c == Cts::FlowControl);
            if rts_flow != cts_flow {
                return Err(Error::unsupported(
                    "RTS and CTS flow control must be enabled or disabled together",
                ));
            }
            if rts_flow {
                t.c_cflag |= libc::CRTSCTS;
            } else {
                t.c_cflag &= !libc::CRTSCTS;
            }
        }

        if config.dtr == Some(Dtr::FlowControl) || config.dsr == Some(Dsr::FlowControl) {
            return Err(Error::unsupported("DTR/DSR flow control"));
        }

        if let Some(xon_xoff) = config.xon_xoff {
            t.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
            t.c_iflag |= match xon_xoff {
                XonXoff::Disabled => 0,
                XonXoff::In => libc::IXOFF,
                XonXoff::Out => libc::IXON | libc::IXANY,
                XonXoff::InOut => libc::IXON | libc::IXOFF | libc::IXANY,
            };
        }

        self.termios = t;
        self.custom_speed = custom_speed;
        Ok(())
    }
}

fn read_modem_bits(fd: RawFd) -> Result<Option<c_int>> {
    let mut bits: c_int = 0;
    if unsafe { libc::ioctl(fd, libc::TIOCMGET, &mut bits as *mut c_int) } < 0 {
        let err = std::io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::ENOTTY) | Some(libc::EINVAL) => Ok(None),
            _ => Err(Error::os("ioctl(TIOCMGET)", err)),
        };
    }
    Ok(Some(bits))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn has_cmspar(t: &NativeTermios) -> bool {
    t.c_cflag & libc::CMSPAR != 0
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn has_cmspar(_: &NativeTermios) -> bool {
    false
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn clear_cmspar(t: &mut NativeTermios) {
    t.c_cflag &= !libc::CMSPAR;
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn clear_cmspar(_: &mut NativeTermios) {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn set_cmspar(t: &mut NativeTermios, _: &str) -> Result<()> {
    t.c_cflag |= libc::CMSPAR;
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn set_cmspar(_: &mut NativeTermios, which: &str) -> Result<()> {
    Err(Error::unsupported(format!("{} parity", which)))
}

#[cfg(all(
    target_os = "linux",
    not(any(target_env = "musl", target_arch = "powerpc", target_arch = "powerpc64"))
))]
mod speed {
    use crate::error::{Error, Result};
    use std::os::unix::io::RawFd;

    pub(crate) type NativeTermios = libc::termios2;

    pub(crate) fn get_termios(fd: RawFd) -> Result<NativeTermios> {
        let mut t: NativeTermios = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(fd, libc::TCGETS2, &mut t as *mut NativeTermios) } < 0 {
            return Err(Error::last_os("ioctl(TCGETS2)"));
        }
        Ok(t)
    }

    pub(crate) fn set_termios(fd: RawFd, t: &NativeTermios) -> Result<()> {
        if unsafe { libc::ioctl(fd, libc::TCSETS2, t as *const NativeTermios) } < 0 {
            return Err(Error::last_os("ioctl(TCSETS2)"));
        }
        Ok(())
    }

    /// The kernel keeps `c_ospeed` in sync with the `CBAUD` code.
    pub(crate) fn read_speed(t: &NativeTermios) -> Option<u32> {
        Some(t.c_ospeed).filter(|&speed| speed != 0)
    }

    pub(crate) fn write_speed(t: &mut NativeTermios, baud: u32) -> Result<Option<u32>> {
        // CIBAUD left at B0 makes the input rate follow the output rate
        t.c_cflag &= !(libc::CBAUD | libc::CIBAUD);
        t.c_cflag |= libc::BOTHER;
        t.c_ispeed = baud;
        t.c_ospeed = baud;
        Ok(None)
    }
}

#[cfg(not(all(
    target_os = "linux",
    not(any(target_env = "musl", target_arch = "powerpc", target_arch = "powerpc64"))
)))]
mod speed {
    use crate::error::{Error, Result};
    use std::os::unix::io::RawFd;

    pub(crate) type NativeTermios = libc::termios;

    pub(crate) const STANDARD_RATES: &[(u32, libc::speed_t)] = &[
        (50, libc::B50),
        (75, libc::B75),
        (110, libc::B110),
        (134, libc::B134),
        (150, libc::B150),
        (200, libc::B200),
        (300, libc::B300),
        (600, libc::B600),
        (1200, libc::B1200),
        (1800, libc::B1800),
        (2400, libc::B2400),
        (4800, libc::B4800),
        (9600, libc::B9600),
        (19200, libc::B19200),
        (38400, libc::B38400),
        (57600, libc::B57600),
        (115200, libc::B115200),
        (230400, libc::B230400),
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "freebsd",
            target_os = "netbsd"
        ))]
        (460800, libc::B460800),
    ];

    pub(crate) fn get_termios(fd: RawFd) -> Result<NativeTermios> {
        let mut t: NativeTermios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut t) } < 0 {
            return Err(Error::last_os("tcgetattr"));
        }
        Ok(t)
    }

    pub(crate) fn set_termios(fd: RawFd, t: &NativeTermios) -> Result<()> {
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, t) } < 0 {
            return Err(Error::last_os("tcsetattr"));
        }
        Ok(())
    }

    pub(crate) fn read_speed(t: &NativeTermios) -> Option<u32> {
        let code = unsafe { libc::cfgetospeed(t) };
        if let Some(&(baud, _)) = STANDARD_RATES.iter().find(|(_, c)| *c == code) {
            return Some(baud);
        }
        // speed_t carries the plain rate on the BSDs and macOS
        if cfg!(any(target_os = "macos", target_os = "ios", target_os = "freebsd")) && code != 0 {
            return u32::try_from(code).ok();
        }
        None
    }

    pub(crate) fn write_speed(t: &mut NativeTermios, baud: u32) -> Result<Option<u32>> {
        if let Some(&(_, code)) = STANDARD_RATES.iter().find(|(b, _)| *b == baud) {
            if unsafe { libc::cfsetispeed(t, code) } < 0 || unsafe { libc::cfsetospeed(t, code) } < 0
            {
                return Err(Error::last_os("cfsetspeed"));
            }
            return Ok(None);
        }
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            return Ok(Some(baud));
        }
        Err(Error::unsupported(format!("non-standard baud rate {}", baud)))
    }
}

pub(crate) use speed::set_termios;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn blank() -> PosixLineConfig {
        PosixLineConfig {
            termios: unsafe { std::mem::zeroed() },
            modem: Some(libc::TIOCM_RTS),
            custom_speed: None,
        }
    }

    #[test]
    fn test_encode_decode_8n1() {
        let mut line = blank();
        let config = PortConfiguration::new()
            .with_baudrate(9600)
            .with_bits(8)
            .with_parity(Parity::None)
            .with_stopbits(1);
        line.encode(&config).unwrap();

        let back = line.decode();
        assert_eq!(back.baudrate, Some(9600));
        assert_eq!(back.bits, Some(8));
        assert_eq!(back.parity, Some(Parity::None));
        assert_eq!(back.stopbits, Some(1));
        assert_eq!(back.rts, Some(Rts::On));
        assert_eq!(back.dtr, Some(Dtr::Off));
        assert_eq!(back.cts, Some(Cts::Ignore));
        assert_eq!(back.xon_xoff, Some(XonXoff::Disabled));
    }

    #[test]
    fn test_parity_without_ignpar_is_unset() {
        let line = blank();
        assert_eq!(line.decode().parity, None);
    }

    #[test]
    fn test_odd_even_parity() {
        let mut line = blank();
        line.encode(&PortConfiguration::new().with_parity(Parity::Odd)).unwrap();
        assert_eq!(line.decode().parity, Some(Parity::Odd));
        line.encode(&PortConfiguration::new().with_parity(Parity::Even)).unwrap();
        assert_eq!(line.decode().parity, Some(Parity::Even));
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn test_mark_space_parity() {
        let mut line = blank();
        line.encode(&PortConfiguration::new().with_parity(Parity::Mark)).unwrap();
        assert_eq!(line.decode().parity, Some(Parity::Mark));
        line.encode(&PortConfiguration::new().with_parity(Parity::Space)).unwrap();
        assert_eq!(line.decode().parity, Some(Parity::Space));
    }

    #[test]
    fn test_rts_without_cts_rejected_untouched() {
        let mut line = blank();
        line.encode(&PortConfiguration::new().with_baudrate(19200)).unwrap();
        let before = line.decode();

        let mut config = PortConfiguration::new().with_baudrate(57600);
        config.rts = Some(Rts::FlowControl);
        let err = line.encode(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(line.decode(), before);
    }

    #[test]
    fn test_rtscts_pair() {
        let mut line = blank();
        let config = PortConfiguration::new().with_flowcontrol(crate::port::FlowControl::RtsCts);
        line.encode(&config).unwrap();
        let back = line.decode();
        assert_eq!(back.rts, Some(Rts::FlowControl));
        assert_eq!(back.cts, Some(Cts::FlowControl));

        // disabling only one half while the pair is active
        let mut off = PortConfiguration::new();
        off.cts = Some(Cts::Ignore);
        assert_eq!(line.encode(&off).unwrap_err().kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_dtr_dsr_flow_unsupported() {
        let mut line = blank();
        let config = PortConfiguration::new().with_flowcontrol(crate::port::FlowControl::DtrDsr);
        assert_eq!(line.encode(&config).unwrap_err().kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_xon_xoff_directions() {
        let mut line = blank();
        for dir in [XonXoff::In, XonXoff::Out, XonXoff::InOut, XonXoff::Disabled] {
            let mut config = PortConfiguration::new();
            config.xon_xoff = Some(dir);
            line.encode(&config).unwrap();
            assert_eq!(line.decode().xon_xoff, Some(dir));
        }
        assert!(line.termios.c_iflag & libc::IXANY == 0);
    }

    #[test]
    fn test_invalid_bits_rejected() {
        let mut line = blank();
        let err = line.encode(&PortConfiguration::new().with_bits(4)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_raw_mode_flags() {
        let mut line = blank();
        line.termios.c_lflag = libc::ICANON | libc::ECHO;
        line.termios.c_oflag = libc::OPOST;
        line.termios.c_cflag = libc::HUPCL;
        line.make_raw();
        assert_eq!(line.termios.c_lflag & (libc::ICANON | libc::ECHO), 0);
        assert_eq!(line.termios.c_oflag & libc::OPOST, 0);
        assert_eq!(line.termios.c_cflag & libc::HUPCL, 0);
        assert_ne!(line.termios.c_cflag & libc::CREAD, 0);
    }

    #[test]
    fn test_modem_changes() {
        let mut config = PortConfiguration::new();
        config.rts = Some(Rts::On);
        config.dtr = Some(Dtr::Off);
        let (raise, lower) = PosixLineConfig::modem_changes(&config);
        assert_eq!(raise, libc::TIOCM_RTS);
        assert_eq!(lower, libc::TIOCM_DTR);

        config.rts = Some(Rts::FlowControl);
        config.dtr = None;
        assert_eq!(PosixLineConfig::modem_changes(&config), (0, 0));
    }
}
