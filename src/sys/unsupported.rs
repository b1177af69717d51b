//! Fallback for targets without a serial backend. Nothing can be opened.

use crate::error::{Error, Result};
use crate::event::EventMask;
use crate::port::{Buffer, Mode, PortConfiguration, Signals};

pub type RawHandle = i32;

#[derive(Debug)]
pub(crate) enum Handle {}

fn unsupported<T>() -> Result<T> {
    Err(Error::unsupported("serial ports on this platform"))
}

impl Handle {
    pub(crate) fn open(_: &str, _: Mode) -> Result<Self> {
        unsupported()
    }

    pub(crate) fn close(self) -> Result<()> {
        match self {}
    }

    pub(crate) fn raw(&self) -> RawHandle {
        match *self {}
    }

    pub(crate) fn read_config(&self) -> Result<PortConfiguration> {
        match *self {}
    }

    pub(crate) fn apply_config(&mut self, _: &PortConfiguration) -> Result<()> {
        match *self {}
    }

    pub(crate) fn blocking_read(&mut self, _: &mut [u8], _: u32) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn blocking_read_next(&mut self, _: &mut [u8], _: u32) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn nonblocking_read(&mut self, _: &mut [u8]) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn blocking_write(&mut self, _: &[u8], _: u32) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn nonblocking_write(&mut self, _: &[u8]) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn input_waiting(&self) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn output_waiting(&self) -> Result<usize> {
        match *self {}
    }

    pub(crate) fn flush(&mut self, _: Buffer) -> Result<()> {
        match *self {}
    }

    pub(crate) fn drain(&mut self) -> Result<()> {
        match *self {}
    }

    pub(crate) fn start_break(&mut self) -> Result<()> {
        match *self {}
    }

    pub(crate) fn end_break(&mut self) -> Result<()> {
        match *self {}
    }

    pub(crate) fn signals(&self) -> Result<Signals> {
        match *self {}
    }

    pub(crate) fn event_sources(&self, _: EventMask) -> Vec<(RawHandle, EventMask)> {
        match *self {}
    }
}

pub(crate) fn wait(_: &[(RawHandle, EventMask)], _: u32) -> Result<()> {
    unsupported()
}
