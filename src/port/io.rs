//! Data transfer on an open [`Port`].
//!
//! Timeouts are in milliseconds; `0` means wait indefinitely. A blocking
//! call that times out returns the short count it managed, not an error.
//!
//! Transfers borrow the port mutably, so no other thread can close it
//! mid-call. A caller that needs to give up early should loop over a
//! short timeout and check its own stop condition between calls rather
//! than pass `0`.

use super::{Buffer, Port, Signals};
use crate::error::{Error, Result};
use std::io;

impl Port {
    /// Read until `buf` is full or `timeout_ms` elapses.
    ///
    /// # Arguments
    /// * `buf` - Destination; an empty buffer returns `0` immediately
    /// * `timeout_ms` - Overall deadline, `0` for none
    ///
    /// # Example
    /// ```no_run
    /// use serialio::{Mode, Port};
    ///
    /// let mut port = Port::by_name("/dev/ttyUSB0")?;
    /// port.open(Mode::ReadWrite)?;
    /// let mut frame = [0u8; 16];
    /// let n = port.blocking_read(&mut frame, 500)?;
    /// println!("got {} bytes", n);
    /// # Ok::<(), serialio::Error>(())
    /// ```
    pub fn blocking_read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let handle = self.open_handle_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        handle.blocking_read(buf, timeout_ms)
    }

    /// Wait for at least one byte, then return whatever is available.
    ///
    /// With `timeout_ms == 0` this only returns once data arrives or the
    /// device fails; see the module notes on cancellation.
    pub fn blocking_read_next(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let handle = self.open_handle_mut()?;
        if buf.is_empty() {
            return Err(Error::invalid("zero-length read buffer"));
        }
        handle.blocking_read_next(buf, timeout_ms)
    }

    /// One read attempt; `0` if nothing is queued.
    pub fn nonblocking_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let handle = self.open_handle_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        handle.nonblocking_read(buf)
    }

    /// Write all of `buf` unless `timeout_ms` elapses first.
    ///
    /// Returns once the bytes are handed to the OS, not once they are on
    /// the wire. Use [`drain`](Port::drain) for that.
    pub fn blocking_write(&mut self, buf: &[u8], timeout_ms: u32) -> Result<usize> {
        let handle = self.open_handle_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        handle.blocking_write(buf, timeout_ms)
    }

    /// One write attempt; `0` if the output queue is full.
    pub fn nonblocking_write(&mut self, buf: &[u8]) -> Result<usize> {
        let handle = self.open_handle_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        handle.nonblocking_write(buf)
    }

    /// Bytes received and not yet read.
    pub fn input_waiting(&self) -> Result<usize> {
        self.open_handle()?.input_waiting()
    }

    /// Bytes queued for transmission.
    pub fn output_waiting(&self) -> Result<usize> {
        self.open_handle()?.output_waiting()
    }

    /// Discard queued data.
    pub fn flush(&mut self, buffers: Buffer) -> Result<()> {
        self.open_handle_mut()?.flush(buffers)
    }

    /// Block until all queued output has been transmitted.
    pub fn drain(&mut self) -> Result<()> {
        self.open_handle_mut()?.drain()
    }

    pub fn start_break(&mut self) -> Result<()> {
        self.open_handle_mut()?.start_break()
    }

    pub fn end_break(&mut self) -> Result<()> {
        self.open_handle_mut()?.end_break()
    }

    /// Current state of the modem input lines.
    pub fn signals(&self) -> Result<Signals> {
        self.open_handle()?.signals()
    }
}

impl io::Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        Ok(self.blocking_read_next(buf, 0)?)
    }
}

impl io::Write for Port {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.blocking_write(buf, 0)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.drain()?)
    }
}
