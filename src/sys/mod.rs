//! Compile-time selection of the platform backend.
//!
//! Each backend exposes the same `Handle` surface plus a free `wait`
//! function for event sets.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use self::unix::{wait, Handle};
#[cfg(unix)]
pub use self::unix::RawHandle;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use self::windows::{wait, Handle};
#[cfg(windows)]
pub use self::windows::RawHandle;

#[cfg(not(any(unix, windows)))]
mod unsupported;
#[cfg(not(any(unix, windows)))]
pub(crate) use self::unsupported::{wait, Handle};
#[cfg(not(any(unix, windows)))]
pub use self::unsupported::RawHandle;
