//! Shared test utilities.
//!
//! On Linux a pseudo-terminal pair stands in for a null-modem cable: the
//! library opens the slave side by name, the test drives the master side
//! directly.

#![allow(dead_code)]

use std::time::Duration;

/// Generous upper bound for timing assertions on loaded CI machines.
pub const TIMING_SLACK: Duration = Duration::from_millis(250);

#[cfg(target_os = "linux")]
pub use self::pty::PtyPair;

#[cfg(target_os = "linux")]
mod pty {
    use std::ffi::CStr;
    use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
    use std::time::{Duration, Instant};

    /// Master/slave pseudo-terminal pair.
    ///
    /// The slave descriptor stays open for the lifetime of the pair so the
    /// master never sees a hangup between test steps.
    pub struct PtyPair {
        pub master: OwnedFd,
        _slave: OwnedFd,
        pub slave_name: String,
    }

    impl PtyPair {
        pub fn open() -> Self {
            let mut master = -1;
            let mut slave = -1;
            let rc = unsafe {
                libc::openpty(
                    &mut master,
                    &mut slave,
                    std::ptr::null_mut(),
                    std::ptr::null(),
                    std::ptr::null(),
                )
            };
            assert_eq!(rc, 0, "openpty: {}", std::io::Error::last_os_error());
            let master = unsafe { OwnedFd::from_raw_fd(master) };
            let slave = unsafe { OwnedFd::from_raw_fd(slave) };

            let mut buf = [0 as libc::c_char; 128];
            let rc = unsafe { libc::ttyname_r(slave.as_raw_fd(), buf.as_mut_ptr(), buf.len()) };
            assert_eq!(rc, 0, "ttyname_r failed");
            let slave_name = unsafe { CStr::from_ptr(buf.as_ptr()) }
                .to_string_lossy()
                .into_owned();

            Self {
                master,
                _slave: slave,
                slave_name,
            }
        }

        /// Write all of `data` into the master side.
        pub fn write(&self, data: &[u8]) {
            write_fd(self.master.as_raw_fd(), data);
        }

        /// Read exactly `len` bytes from the master side or panic after `timeout`.
        pub fn read_exact(&self, len: usize, timeout: Duration) -> Vec<u8> {
            let fd = self.master.as_raw_fd();
            let deadline = Instant::now() + timeout;
            let mut out = Vec::with_capacity(len);
            let mut buf = [0u8; 256];

            while out.len() < len {
                let left = deadline.saturating_duration_since(Instant::now());
                assert!(!left.is_zero(), "timed out after {} of {} bytes", out.len(), len);
                let mut pfd = libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                };
                let ms = left.as_millis().min(i32::MAX as u128) as libc::c_int;
                if unsafe { libc::poll(&mut pfd, 1, ms) } <= 0 {
                    continue;
                }
                let want = buf.len().min(len - out.len());
                let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), want) };
                assert!(n > 0, "read from master: {}", std::io::Error::last_os_error());
                out.extend_from_slice(&buf[..n as usize]);
            }
            out
        }
    }

    pub fn write_fd(fd: libc::c_int, data: &[u8]) {
        let mut done = 0;
        while done < data.len() {
            let n = unsafe { libc::write(fd, data[done..].as_ptr().cast(), data.len() - done) };
            assert!(n > 0, "write to master: {}", std::io::Error::last_os_error());
            done += n as usize;
        }
    }
}
