//! POSIX backend: file descriptors, termios, `poll`.

mod termios;

use self::termios::{set_termios, PosixLineConfig};
use crate::debug::debug_log;
use crate::error::{Error, Result};
use crate::event::EventMask;
use crate::port::{Buffer, LineConfig, Mode, PortConfiguration, Signals};
use crate::timing::Timeout;
use libc::{c_int, c_short};
use std::ffi::CString;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// OS identity of an open port.
pub type RawHandle = RawFd;

/// Longest single `poll` step; longer timeouts loop.
const MAX_POLL_MS: u32 = c_int::MAX as u32;

#[cfg(any(target_os = "macos", target_os = "ios"))]
const IOSSIOSPEED: libc::c_ulong = 0x8008_5402;

/// An open serial device.
#[derive(Debug)]
pub(crate) struct Handle {
    fd: OwnedFd,
}

impl Handle {
    pub(crate) fn open(path: &str, mode: Mode) -> Result<Self> {
        let cpath = CString::new(path).map_err(|_| Error::invalid("port name contains NUL"))?;
        let access = match mode {
            Mode::Read => libc::O_RDONLY,
            Mode::Write => libc::O_WRONLY,
            Mode::ReadWrite => libc::O_RDWR,
        };
        let flags = access | libc::O_NONBLOCK | libc::O_NOCTTY | libc::O_CLOEXEC;

        let raw = unsafe { libc::open(cpath.as_ptr(), flags) };
        if raw < 0 {
            return Err(Error::last_os("open"));
        }
        // from here on the descriptor is closed on every early return
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        debug_log!("open({}) = fd {}", path, raw);

        if unsafe { libc::flock(raw, libc::LOCK_EX | libc::LOCK_NB) } < 0 {
            return Err(Error::last_os("flock"));
        }

        if unsafe { libc::ioctl(raw, libc::TIOCEXCL) } < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINVAL) | Some(libc::ENOTTY) => {}
                _ => return Err(Error::os("ioctl(TIOCEXCL)", err)),
            }
        }

        let mut handle = Self { fd };
        let mut line = PosixLineConfig::read(raw)?;
        line.make_raw();
        let mut config = line.decode();
        if config.baudrate.is_none() {
            config.baudrate = Some(9600);
        }
        handle.commit(&mut line, &config)?;

        Ok(handle)
    }

    pub(crate) fn close(self) -> Result<()> {
        let raw = self.fd.into_raw_fd();
        debug_log!("close(fd {})", raw);
        // TIOCEXCL outlives this descriptor while anyone else holds the tty
        unsafe { libc::ioctl(raw, libc::TIOCNXCL) };
        if unsafe { libc::close(raw) } < 0 {
            return Err(Error::last_os("close"));
        }
        Ok(())
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.fd.as_raw_fd()
    }

    pub(crate) fn read_config(&self) -> Result<PortConfiguration> {
        Ok(PosixLineConfig::read(self.raw())?.decode())
    }

    pub(crate) fn apply_config(&mut self, config: &PortConfiguration) -> Result<()> {
        let mut line = PosixLineConfig::read(self.raw())?;
        self.commit(&mut line, config)
    }

    /// Encode `config` into `line`, then make the OS calls.
    ///
    /// Nothing reaches the device unless encoding succeeds.
    fn commit(&mut self, line: &mut PosixLineConfig, config: &PortConfiguration) -> Result<()> {
        line.encode(config)?;
        let fd = self.raw();

        set_termios(fd, &line.termios)?;

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        if let Some(baud) = line.custom_speed {
            let speed = baud as libc::speed_t;
            if unsafe { libc::ioctl(fd, IOSSIOSPEED, &speed as *const libc::speed_t) } < 0 {
                return Err(Error::last_os("ioctl(IOSSIOSPEED)"));
            }
        }

        let (raise, lower) = PosixLineConfig::modem_changes(config);
        if raise != 0 && unsafe { libc::ioctl(fd, libc::TIOCMBIS, &raise as *const c_int) } < 0 {
            return Err(Error::last_os("ioctl(TIOCMBIS)"));
        }
        if lower != 0 && unsafe { libc::ioctl(fd, libc::TIOCMBIC, &lower as *const c_int) } < 0 {
            return Err(Error::last_os("ioctl(TIOCMBIC)"));
        }

        debug_log!("fd {} configured: {}", fd, config);
        Ok(())
    }

    pub(crate) fn blocking_read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let fd = self.raw();
        let mut timeout = Timeout::start(timeout_ms).with_ceiling(MAX_POLL_MS);
        let mut done = 0;

        while done < buf.len() {
            if timeout.expired() {
                break;
            }
            if !poll_step(fd, libc::POLLIN, &mut timeout)? {
                break;
            }
            match transfer(unsafe {
                libc::read(fd, buf[done..].as_mut_ptr().cast(), buf.len() - done)
            }) {
                Ok(n) => done += n,
                Err(err) if retryable(&err) => continue,
                Err(err) => return Err(Error::os("read", err)),
            }
        }

        if done < buf.len() {
            debug_log!("fd {}: read timed out after {} of {} bytes", fd, done, buf.len());
        }
        Ok(done)
    }

    pub(crate) fn blocking_read_next(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let fd = self.raw();
        let mut timeout = Timeout::start(timeout_ms).with_ceiling(MAX_POLL_MS);

        loop {
            if timeout.expired() {
                return Ok(0);
            }
            if !poll_step(fd, libc::POLLIN, &mut timeout)? {
                return Ok(0);
            }
            match transfer(unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) }) {
                Ok(0) => continue,
                Ok(n) => return Ok(n),
                Err(err) if retryable(&err) => continue,
                Err(err) => return Err(Error::os("read", err)),
            }
        }
    }

    pub(crate) fn nonblocking_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match transfer(unsafe { libc::read(self.raw(), buf.as_mut_ptr().cast(), buf.len()) }) {
            Ok(n) => Ok(n),
            Err(err) if retryable(&err) => Ok(0),
            Err(err) => Err(Error::os("read", err)),
        }
    }

    pub(crate) fn blocking_write(&mut self, buf: &[u8], timeout_ms: u32) -> Result<usize> {
        let fd = self.raw();
        let mut timeout = Timeout::start(timeout_ms).with_ceiling(MAX_POLL_MS);
        let mut done = 0;

        while done < buf.len() {
            if timeout.expired() {
                break;
            }
            if !poll_step(fd, libc::POLLOUT, &mut timeout)? {
                break;
            }
            match transfer(unsafe {
                libc::write(fd, buf[done..].as_ptr().cast(), buf.len() - done)
            }) {
                Ok(n) => done += n,
                Err(err) if retryable(&err) => continue,
                Err(err) => return Err(Error::os("write", err)),
            }
        }

        if done < buf.len() {
            debug_log!("fd {}: write timed out after {} of {} bytes", fd, done, buf.len());
        }
        Ok(done)
    }

    pub(crate) fn nonblocking_write(&mut self, buf: &[u8]) -> Result<usize> {
        match transfer(unsafe { libc::write(self.raw(), buf.as_ptr().cast(), buf.len()) }) {
            Ok(n) => Ok(n),
            Err(err) if retryable(&err) => Ok(0),
            Err(err) => Err(Error::os("write", err)),
        }
    }

    pub(crate) fn input_waiting(&self) -> Result<usize> {
        let mut count: c_int = 0;
        if unsafe { libc::ioctl(self.raw(), libc::FIONREAD, &mut count as *mut c_int) } < 0 {
            return Err(Error::last_os("ioctl(FIONREAD)"));
        }
        Ok(count.max(0) as usize)
    }

    pub(crate) fn output_waiting(&self) -> Result<usize> {
        let mut count: c_int = 0;
        if unsafe { libc::ioctl(self.raw(), libc::TIOCOUTQ, &mut count as *mut c_int) } < 0 {
            return Err(Error::last_os("ioctl(TIOCOUTQ)"));
        }
        Ok(count.max(0) as usize)
    }

    pub(crate) fn flush(&mut self, buffers: Buffer) -> Result<()> {
        let queue = match buffers {
            Buffer::Input => libc::TCIFLUSH,
            Buffer::Output => libc::TCOFLUSH,
            Buffer::Both => libc::TCIOFLUSH,
        };
        if unsafe { libc::tcflush(self.raw(), queue) } < 0 {
            return Err(Error::last_os("tcflush"));
        }
        Ok(())
    }

    pub(crate) fn drain(&mut self) -> Result<()> {
        loop {
            if unsafe { libc::tcdrain(self.raw()) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::os("tcdrain", err));
            }
        }
    }

    pub(crate) fn start_break(&mut self) -> Result<()> {
        if unsafe { libc::ioctl(self.raw(), libc::TIOCSBRK, 1) } < 0 {
            return Err(Error::last_os("ioctl(TIOCSBRK)"));
        }
        Ok(())
    }

    pub(crate) fn end_break(&mut self) -> Result<()> {
        if unsafe { libc::ioctl(self.raw(), libc::TIOCCBRK, 1) } < 0 {
            return Err(Error::last_os("ioctl(TIOCCBRK)"));
        }
        Ok(())
    }

    pub(crate) fn signals(&self) -> Result<Signals> {
        let mut bits: c_int = 0;
        if unsafe { libc::ioctl(self.raw(), libc::TIOCMGET, &mut bits as *mut c_int) } < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                // no modem lines, e.g. a pseudo-terminal
                Some(libc::ENOTTY) | Some(libc::EINVAL) => {
                    Err(Error::unsupported("modem status on this device"))
                }
                _ => Err(Error::os("ioctl(TIOCMGET)", err)),
            };
        }
        let mut signals = Signals::empty();
        for (flag, signal) in [
            (libc::TIOCM_CTS, Signals::CTS),
            (libc::TIOCM_DSR, Signals::DSR),
            (libc::TIOCM_CAR, Signals::DCD),
            (libc::TIOCM_RNG, Signals::RI),
        ] {
            if bits & flag != 0 {
                signals |= signal;
            }
        }
        Ok(signals)
    }

    /// Waitable identities for an event set entry.
    pub(crate) fn event_sources(&self, mask: EventMask) -> Vec<(RawHandle, EventMask)> {
        vec![(self.raw(), mask)]
    }
}

/// Turn a `read`/`write` return value into a byte count, retrying nothing.
fn transfer(ret: isize) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

fn retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn poll_timeout(timeout: &Timeout) -> c_int {
    if timeout.is_infinite() {
        -1
    } else {
        c_int::try_from(timeout.remaining_ms()).unwrap_or(c_int::MAX)
    }
}

/// Wait once for `events` on `fd`. `Ok(false)` means the deadline passed.
///
/// A step cut short by the poll ceiling or a signal reports ready so the
/// caller loops and re-checks its deadline.
fn poll_step(fd: RawFd, events: c_short, timeout: &mut Timeout) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut pfd, 1, poll_timeout(timeout)) };
    timeout.record_attempt();

    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(true);
        }
        return Err(Error::os("poll", err));
    }
    if ret == 0 {
        return Ok(timeout.overflowed());
    }
    Ok(true)
}

/// Block until any entry is ready or the timeout elapses (`0` = forever).
pub(crate) fn wait(entries: &[(RawHandle, EventMask)], timeout_ms: u32) -> Result<()> {
    wait_stepped(entries, timeout_ms, MAX_POLL_MS)
}

/// [`wait`] with each `poll` call limited to `step_ms`.
fn wait_stepped(entries: &[(RawHandle, EventMask)], timeout_ms: u32, step_ms: u32) -> Result<()> {
    let mut fds: Vec<libc::pollfd> = Vec::new();
    fds.try_reserve(entries.len())?;
    fds.extend(entries.iter().map(|&(fd, mask)| {
        let mut events: c_short = 0;
        if mask.contains(EventMask::RX_READY) {
            events |= libc::POLLIN;
        }
        if mask.contains(EventMask::TX_READY) {
            events |= libc::POLLOUT;
        }
        if mask.contains(EventMask::ERROR) {
            events |= libc::POLLERR;
        }
        libc::pollfd {
            fd,
            events,
            revents: 0,
        }
    }));

    let mut timeout = Timeout::start(timeout_ms).with_ceiling(step_ms);
    loop {
        if timeout.expired() {
            break;
        }
        let ret = unsafe {
            libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, poll_timeout(&timeout))
        };
        timeout.record_attempt();

        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::os("poll", err));
        }
        if ret == 0 && timeout.overflowed() {
            continue;
        }
        break;
    }
    Ok(())
}
