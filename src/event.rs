//! Waiting on readiness of several ports at once.
//!
//! An [`EventSet`] collects `(waitable, interest)` pairs and blocks in a
//! single OS wait call. It only borrows the ports' OS identities: dropping
//! the set never closes a port, and a port must stay open for as long as a
//! set containing it is waited on.

use crate::debug::debug_log;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::sys::{self, RawHandle};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Interest bits for [`EventSet::add`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u8);

impl EventMask {
    /// Data is available to read.
    pub const RX_READY: EventMask = EventMask(1);
    /// Output buffer has room.
    pub const TX_READY: EventMask = EventMask(2);
    /// An error condition is pending.
    pub const ERROR: EventMask = EventMask(4);

    const ALL: u8 = 0b111;

    pub const fn empty() -> Self {
        EventMask(0)
    }

    /// Build a mask from raw bits, rejecting unknown ones.
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !Self::ALL != 0 {
            return Err(Error::invalid(format!("invalid event mask {:#x}", bits)));
        }
        Ok(EventMask(bits))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        EventMask(self.0 & rhs.0)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::RX_READY) {
            names.push("RX_READY");
        }
        if self.contains(Self::TX_READY) {
            names.push("TX_READY");
        }
        if self.contains(Self::ERROR) {
            names.push("ERROR");
        }
        write!(f, "EventMask({})", names.join(" | "))
    }
}

/// Batched readiness interests for a single [`wait`](EventSet::wait).
#[derive(Debug, Default)]
pub struct EventSet {
    entries: Vec<(RawHandle, EventMask)>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `mask` on an open `port`.
    ///
    /// An empty mask is accepted and ignored.
    pub fn add(&mut self, port: &Port, mask: EventMask) -> Result<()> {
        if mask.is_empty() {
            return Ok(());
        }
        let handle = port
            .handle()
            .ok_or_else(|| Error::invalid(format!("port {} is not open", port.name())))?;

        let sources = handle.event_sources(mask);
        self.entries.try_reserve(sources.len())?;
        self.entries.extend(sources);
        debug_log!("event set: {} interest {:?}", port.name(), mask);
        Ok(())
    }

    /// Number of registered waitable handles (may exceed the number of ports).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered `(handle, mask)` pairs in insertion order.
    pub fn entries(&self) -> &[(RawHandle, EventMask)] {
        &self.entries
    }

    /// Block until any registered interest is ready or `timeout_ms` elapses.
    ///
    /// `0` waits indefinitely. Which entry fired is not reported; re-query
    /// the ports afterwards.
    pub fn wait(&self, timeout_ms: u32) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::invalid("event set is empty"));
        }
        debug_log!("waiting on {} handles, timeout {} ms", self.entries.len(), timeout_ms);
        sys::wait(&self.entries, timeout_ms)
    }
}
