//! Windows backend: COMM handles with overlapped I/O.
//!
//! Every port owns three manual-reset events. `read_ovl` backs reads,
//! `write_ovl` backs writes and `wait_ovl` backs the background
//! `WaitCommEvent` that makes RX/error readiness waitable. The write and
//! wait operations outlive individual calls, so their progress is tracked
//! in [`IoState`].

mod dcb;

use self::dcb::WindowsLineConfig;
use crate::debug::debug_log;
use crate::error::{Error, Result};
use crate::event::EventMask;
use crate::port::{Buffer, LineConfig, Mode, PortConfiguration, Signals};
use crate::timing::Timeout;
use std::ffi::OsStr;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::{
    ERROR_IO_INCOMPLETE, ERROR_IO_PENDING, ERROR_SEM_TIMEOUT, WAIT_TIMEOUT,
};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::fileapi::{CreateFileW, FlushFileBuffers, ReadFile, WriteFile, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::ioapiset::GetOverlappedResult;
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::synchapi::{CreateEventW, WaitForMultipleObjects};
use winapi::um::winbase::{
    ClearCommBreak, ClearCommError, GetCommModemStatus, GetCommState, PurgeComm, SetCommBreak,
    SetCommMask, SetCommState, SetCommTimeouts, WaitCommEvent, COMMTIMEOUTS, COMSTAT, DCB,
    EV_ERR, EV_RXCHAR, FILE_FLAG_OVERLAPPED, INFINITE, MS_CTS_ON, MS_DSR_ON, MS_RING_ON,
    MS_RLSD_ON, PURGE_RXCLEAR, PURGE_TXCLEAR, WAIT_FAILED,
};
use winapi::um::winnt::{
    FILE_ATTRIBUTE_NORMAL, GENERIC_READ, GENERIC_WRITE, HANDLE, MAXDWORD, MAXIMUM_WAIT_OBJECTS,
};

/// OS identity of an open port (or of one of its wait events).
pub type RawHandle = HANDLE;

/// Largest single `WriteFile` request.
pub(crate) const WRITEFILE_MAX_SIZE: usize = 33_525_760;

/// `OVERLAPPED::Internal` while the operation is outstanding.
const STATUS_PENDING: usize = 0x0000_0103;

/// Longest single wait step; `INFINITE` is `MAXDWORD`.
const MAX_WAIT_MS: u32 = MAXDWORD - 1;

/// Progress of one long-lived overlapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InFlight,
}

/// Outstanding overlapped operations of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoState {
    write: Phase,
    wait: Phase,
}

impl IoState {
    const IDLE: IoState = IoState {
        write: Phase::Idle,
        wait: Phase::Idle,
    };
}

/// An open COMM port.
pub(crate) struct Handle {
    handle: HANDLE,
    // boxed so their addresses stay put while the kernel holds them
    read_ovl: Box<OVERLAPPED>,
    write_ovl: Box<OVERLAPPED>,
    wait_ovl: Box<OVERLAPPED>,
    comm_events: Box<DWORD>,
    timeouts: COMMTIMEOUTS,
    write_buf: Vec<u8>,
    state: IoState,
}

// The handle and its event objects are exclusively owned and carry no
// thread affinity.
unsafe impl Send for Handle {}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("write_buf", &self.write_buf.len())
            .finish()
    }
}

fn new_overlapped() -> Result<Box<OVERLAPPED>> {
    let mut ovl: Box<OVERLAPPED> = Box::new(unsafe { mem::zeroed() });
    // manual reset, initially signalled
    let event = unsafe { CreateEventW(ptr::null_mut(), TRUE, TRUE, ptr::null()) };
    if event.is_null() {
        return Err(Error::last_os("CreateEvent"));
    }
    ovl.hEvent = event;
    Ok(ovl)
}

fn last_error() -> DWORD {
    unsafe { GetLastError() }
}

impl Handle {
    pub(crate) fn open(name: &str, mode: Mode) -> Result<Self> {
        // the \\.\ prefix is required for COM10 and above
        let path: Vec<u16> = OsStr::new(&format!("\\\\.\\{}", name))
            .encode_wide()
            .chain(Some(0))
            .collect();
        let access = match mode {
            Mode::Read => GENERIC_READ,
            Mode::Write => GENERIC_WRITE,
            Mode::ReadWrite => GENERIC_READ | GENERIC_WRITE,
        };

        let raw = unsafe {
            CreateFileW(
                path.as_ptr(),
                access,
                0,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL | FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if raw == INVALID_HANDLE_VALUE {
            return Err(Error::last_os("CreateFile"));
        }
        debug_log!("CreateFile({}) = {:?}", name, raw);

        // Drop closes whatever has been created so far
        let mut handle = Self {
            handle: raw,
            read_ovl: Box::new(unsafe { mem::zeroed() }),
            write_ovl: Box::new(unsafe { mem::zeroed() }),
            wait_ovl: Box::new(unsafe { mem::zeroed() }),
            comm_events: Box::new(0),
            timeouts: unsafe { mem::zeroed() },
            write_buf: Vec::new(),
            state: IoState::IDLE,
        };

        handle.set_timeouts(COMMTIMEOUTS {
            ReadIntervalTimeout: 0,
            ReadTotalTimeoutMultiplier: 0,
            ReadTotalTimeoutConstant: 0,
            WriteTotalTimeoutMultiplier: 0,
            WriteTotalTimeoutConstant: 0,
        })?;

        handle.read_ovl = new_overlapped()?;
        handle.write_ovl = new_overlapped()?;
        handle.wait_ovl = new_overlapped()?;

        if unsafe { SetCommMask(handle.handle, EV_RXCHAR | EV_ERR) } == 0 {
            return Err(Error::last_os("SetCommMask"));
        }
        handle.restart_wait()?;

        let mut line = handle.read_line()?;
        line.make_raw();
        let mut config = line.decode();
        if config.baudrate.is_none() {
            config.baudrate = Some(9600);
        }
        handle.commit(&mut line, &config)?;

        Ok(handle)
    }

    pub(crate) fn close(mut self) -> Result<()> {
        debug_log!("CloseHandle({:?})", self.handle);
        let handle = mem::replace(&mut self.handle, INVALID_HANDLE_VALUE);
        if unsafe { CloseHandle(handle) } == 0 {
            return Err(Error::last_os("CloseHandle"));
        }
        for ovl in [&mut self.read_ovl, &mut self.write_ovl, &mut self.wait_ovl] {
            let event = mem::replace(&mut ovl.hEvent, ptr::null_mut());
            if !event.is_null() && unsafe { CloseHandle(event) } == 0 {
                return Err(Error::last_os("CloseHandle"));
            }
        }
        Ok(())
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle
    }

    fn set_timeouts(&mut self, timeouts: COMMTIMEOUTS) -> Result<()> {
        let mut timeouts = timeouts;
        if unsafe { SetCommTimeouts(self.handle, &mut timeouts) } == 0 {
            return Err(Error::last_os("SetCommTimeouts"));
        }
        self.timeouts = timeouts;
        Ok(())
    }

    fn set_read_timeouts(&mut self, interval: DWORD, multiplier: DWORD, constant: DWORD) -> Result<()> {
        let t = &self.timeouts;
        if t.ReadIntervalTimeout == interval
            && t.ReadTotalTimeoutMultiplier == multiplier
            && t.ReadTotalTimeoutConstant == constant
        {
            return Ok(());
        }
        let mut next = self.timeouts;
        next.ReadIntervalTimeout = interval;
        next.ReadTotalTimeoutMultiplier = multiplier;
        next.ReadTotalTimeoutConstant = constant;
        self.set_timeouts(next)
    }

    fn set_write_timeout(&mut self, constant: DWORD) -> Result<()> {
        if self.timeouts.WriteTotalTimeoutConstant == constant {
            return Ok(());
        }
        let mut next = self.timeouts;
        next.WriteTotalTimeoutConstant = constant;
        self.set_timeouts(next)
    }

    /// Poll the background `WaitCommEvent` and start a new one once the
    /// previous one has completed.
    fn restart_wait(&mut self) -> Result<()> {
        if self.state.wait == Phase::InFlight {
            let mut transferred: DWORD = 0;
            let ovl: *mut OVERLAPPED = &mut *self.wait_ovl;
            if unsafe { GetOverlappedResult(self.handle, ovl, &mut transferred, FALSE) } != 0 {
                debug_log!("previous wait completed");
                self.state.wait = Phase::Idle;
            } else if last_error() == ERROR_IO_INCOMPLETE {
                return Ok(());
            } else {
                return Err(Error::last_os("GetOverlappedResult"));
            }
        }

        let events: *mut DWORD = &mut *self.comm_events;
        let ovl: *mut OVERLAPPED = &mut *self.wait_ovl;
        if unsafe { WaitCommEvent(self.handle, events, ovl) } != 0 {
            debug_log!("new wait returned, events already pending");
        } else if last_error() == ERROR_IO_PENDING {
            self.state.wait = Phase::InFlight;
        } else {
            return Err(Error::last_os("WaitCommEvent"));
        }
        Ok(())
    }

    /// Restart the comm-event wait once a read has emptied the input queue.
    fn restart_wait_if_needed(&mut self, bytes_read: usize) -> Result<()> {
        if bytes_read == 0 {
            return Ok(());
        }
        if self.comm_status()?.cbInQue == 0 {
            self.restart_wait()?;
        }
        Ok(())
    }

    fn comm_status(&self) -> Result<COMSTAT> {
        let mut errors: DWORD = 0;
        let mut status: COMSTAT = unsafe { mem::zeroed() };
        if unsafe { ClearCommError(self.handle, &mut errors, &mut status) } == 0 {
            return Err(Error::last_os("ClearCommError"));
        }
        Ok(status)
    }

    /// Block until an in-flight non-blocking write has finished.
    fn finish_write(&mut self) -> Result<()> {
        if self.state.write == Phase::InFlight {
            let mut written: DWORD = 0;
            let ovl: *mut OVERLAPPED = &mut *self.write_ovl;
            if unsafe { GetOverlappedResult(self.handle, ovl, &mut written, TRUE) } == 0 {
                return Err(Error::last_os("GetOverlappedResult"));
            }
            self.state.write = Phase::Idle;
            debug_log!("previous write completed");
        }
        Ok(())
    }

    fn read_line(&self) -> Result<WindowsLineConfig> {
        let mut dcb: DCB = unsafe { mem::zeroed() };
        dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
        if unsafe { GetCommState(self.handle, &mut dcb) } == 0 {
            return Err(Error::last_os("GetCommState"));
        }
        Ok(WindowsLineConfig { dcb })
    }

    pub(crate) fn read_config(&self) -> Result<PortConfiguration> {
        Ok(self.read_line()?.decode())
    }

    pub(crate) fn apply_config(&mut self, config: &PortConfiguration) -> Result<()> {
        let mut line = self.read_line()?;
        self.commit(&mut line, config)
    }

    fn commit(&mut self, line: &mut WindowsLineConfig, config: &PortConfiguration) -> Result<()> {
        line.encode(config)?;

        // size the staging buffer before touching the device
        let staging = config.baudrate.map(|baud| (baud as usize / (8 * 20)).max(1));
        if let Some(size) = staging {
            self.finish_write()?;
            let mut buf = Vec::new();
            buf.try_reserve_exact(size)?;
            buf.resize(size, 0);
            self.write_buf = buf;
        }

        if unsafe { SetCommState(self.handle, &mut line.dcb) } == 0 {
            return Err(Error::last_os("SetCommState"));
        }
        debug_log!("{:?} configured: {}", self.handle, config);
        Ok(())
    }

    fn read_overlapped(&mut self, buf: &mut [u8], wait: bool) -> Result<usize> {
        let len = buf.len().min(MAXDWORD as usize) as DWORD;
        let ovl: *mut OVERLAPPED = &mut *self.read_ovl;
        let started =
            unsafe { ReadFile(self.handle, buf.as_mut_ptr().cast(), len, ptr::null_mut(), ovl) };
        if started == 0 && last_error() != ERROR_IO_PENDING {
            return Err(Error::last_os("ReadFile"));
        }
        let mut transferred: DWORD = 0;
        let block = if wait { TRUE } else { FALSE };
        if unsafe { GetOverlappedResult(self.handle, ovl, &mut transferred, block) } == 0 {
            return Err(Error::last_os("GetOverlappedResult"));
        }
        Ok(transferred as usize)
    }

    pub(crate) fn blocking_read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        // all-zero read timeouts block until the buffer is full
        self.set_read_timeouts(0, 0, timeout_ms)?;
        let n = self.read_overlapped(buf, true)?;
        if n < buf.len() {
            debug_log!("read timed out after {} of {} bytes", n, buf.len());
        }
        self.restart_wait_if_needed(n)?;
        Ok(n)
    }

    pub(crate) fn blocking_read_next(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let constant = if timeout_ms == 0 { MAX_WAIT_MS } else { timeout_ms };
        self.set_read_timeouts(MAXDWORD, MAXDWORD, constant)?;

        let mut n = 0;
        while n == 0 {
            n = self.read_overlapped(buf, true)?;
            if n == 0 && timeout_ms > 0 {
                debug_log!("read timed out");
                break;
            }
        }
        self.restart_wait_if_needed(n)?;
        Ok(n)
    }

    pub(crate) fn nonblocking_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.set_read_timeouts(MAXDWORD, 0, 0)?;
        let n = self.read_overlapped(buf, false)?;
        self.restart_wait_if_needed(n)?;
        Ok(n)
    }

    pub(crate) fn blocking_write(&mut self, buf: &[u8], timeout_ms: u32) -> Result<usize> {
        self.finish_write()?;

        let mut timeout = Timeout::start(timeout_ms).with_ceiling(MAX_WAIT_MS);
        let mut done = 0;

        while done < buf.len() {
            if timeout.expired() {
                break;
            }
            self.set_write_timeout(timeout.remaining_ms())?;

            let chunk = (buf.len() - done).min(WRITEFILE_MAX_SIZE);
            let ovl: *mut OVERLAPPED = &mut *self.write_ovl;
            let started = unsafe {
                WriteFile(
                    self.handle,
                    buf[done..].as_ptr().cast(),
                    chunk as DWORD,
                    ptr::null_mut(),
                    ovl,
                )
            };
            timeout.record_attempt();

            if started == 0 && last_error() != ERROR_IO_PENDING {
                return Err(Error::last_os("WriteFile"));
            }
            let mut written: DWORD = 0;
            if unsafe { GetOverlappedResult(self.handle, ovl, &mut written, TRUE) } == 0 {
                if last_error() == ERROR_SEM_TIMEOUT {
                    debug_log!("write timed out");
                    break;
                }
                return Err(Error::last_os("GetOverlappedResult"));
            }
            done += written as usize;
        }

        Ok(done)
    }

    pub(crate) fn nonblocking_write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.state.write == Phase::InFlight {
            if self.write_ovl.Internal == STATUS_PENDING {
                // one staged write at a time
                return Ok(0);
            }
            self.state.write = Phase::Idle;
        }

        self.set_write_timeout(0)?;

        let count = buf.len().min(WRITEFILE_MAX_SIZE).min(self.write_buf.len());
        self.write_buf[..count].copy_from_slice(&buf[..count]);

        let ovl: *mut OVERLAPPED = &mut *self.write_ovl;
        let started = unsafe {
            WriteFile(
                self.handle,
                self.write_buf.as_ptr().cast(),
                count as DWORD,
                ptr::null_mut(),
                ovl,
            )
        };
        if started == 0 {
            if last_error() != ERROR_IO_PENDING {
                return Err(Error::last_os("WriteFile"));
            }
            if self.write_ovl.Internal == STATUS_PENDING {
                self.state.write = Phase::InFlight;
            }
        }
        Ok(count)
    }

    pub(crate) fn input_waiting(&self) -> Result<usize> {
        Ok(self.comm_status()?.cbInQue as usize)
    }

    pub(crate) fn output_waiting(&self) -> Result<usize> {
        Ok(self.comm_status()?.cbOutQue as usize)
    }

    pub(crate) fn flush(&mut self, buffers: Buffer) -> Result<()> {
        let flags = match buffers {
            Buffer::Input => PURGE_RXCLEAR,
            Buffer::Output => PURGE_TXCLEAR,
            Buffer::Both => PURGE_RXCLEAR | PURGE_TXCLEAR,
        };
        if unsafe { PurgeComm(self.handle, flags) } == 0 {
            return Err(Error::last_os("PurgeComm"));
        }
        if buffers != Buffer::Output {
            self.restart_wait()?;
        }
        Ok(())
    }

    pub(crate) fn drain(&mut self) -> Result<()> {
        self.finish_write()?;
        if unsafe { FlushFileBuffers(self.handle) } == 0 {
            return Err(Error::last_os("FlushFileBuffers"));
        }
        Ok(())
    }

    pub(crate) fn start_break(&mut self) -> Result<()> {
        if unsafe { SetCommBreak(self.handle) } == 0 {
            return Err(Error::last_os("SetCommBreak"));
        }
        Ok(())
    }

    pub(crate) fn end_break(&mut self) -> Result<()> {
        if unsafe { ClearCommBreak(self.handle) } == 0 {
            return Err(Error::last_os("ClearCommBreak"));
        }
        Ok(())
    }

    pub(crate) fn signals(&self) -> Result<Signals> {
        let mut bits: DWORD = 0;
        if unsafe { GetCommModemStatus(self.handle, &mut bits) } == 0 {
            return Err(Error::last_os("GetCommModemStatus"));
        }
        let mut signals = Signals::empty();
        for (flag, signal) in [
            (MS_CTS_ON, Signals::CTS),
            (MS_DSR_ON, Signals::DSR),
            (MS_RLSD_ON, Signals::DCD),
            (MS_RING_ON, Signals::RI),
        ] {
            if bits & flag != 0 {
                signals |= signal;
            }
        }
        Ok(signals)
    }

    /// TX readiness is the write event; RX and error share the comm-event wait.
    pub(crate) fn event_sources(&self, mask: EventMask) -> Vec<(RawHandle, EventMask)> {
        let mut sources = Vec::with_capacity(2);
        if mask.contains(EventMask::TX_READY) {
            sources.push((self.write_ovl.hEvent, EventMask::TX_READY));
        }
        let rx_err = mask & (EventMask::RX_READY | EventMask::ERROR);
        if !rx_err.is_empty() {
            sources.push((self.wait_ovl.hEvent, rx_err));
        }
        sources
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.handle != INVALID_HANDLE_VALUE {
            unsafe { CloseHandle(self.handle) };
        }
        for ovl in [&self.read_ovl, &self.write_ovl, &self.wait_ovl] {
            if !ovl.hEvent.is_null() {
                unsafe { CloseHandle(ovl.hEvent) };
            }
        }
    }
}

/// Block until any entry is ready or the timeout elapses (`0` = forever).
pub(crate) fn wait(entries: &[(RawHandle, EventMask)], timeout_ms: u32) -> Result<()> {
    if entries.len() > MAXIMUM_WAIT_OBJECTS as usize {
        return Err(Error::invalid(format!(
            "at most {} handles can be waited on",
            MAXIMUM_WAIT_OBJECTS
        )));
    }
    let mut handles: Vec<HANDLE> = Vec::new();
    handles.try_reserve(entries.len())?;
    handles.extend(entries.iter().map(|&(handle, _)| handle));

    let mut timeout = Timeout::start(timeout_ms).with_ceiling(MAX_WAIT_MS);
    loop {
        if timeout.expired() {
            break;
        }
        let step = if timeout.is_infinite() {
            INFINITE
        } else {
            timeout.remaining_ms()
        };
        let ret =
            unsafe { WaitForMultipleObjects(handles.len() as DWORD, handles.as_ptr(), FALSE, step) };
        timeout.record_attempt();

        if ret == WAIT_FAILED {
            return Err(Error::last_os("WaitForMultipleObjects"));
        }
        if ret == WAIT_TIMEOUT && timeout.overflowed() {
            continue;
        }
        break;
    }
    Ok(())
}
