//! Error taxonomy shared by every serial operation.
//!
//! Each fallible call returns one of four kinds: a caller mistake
//! ([`Error::InvalidArgument`]), a failed OS call ([`Error::Os`]), a feature
//! the platform or device lacks ([`Error::Unsupported`]) or resource
//! exhaustion ([`Error::Allocation`]).

use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller passed a null, out-of-range or contradictory input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An OS call failed.
    #[error("{context} failed: {source}")]
    Os {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The operation is meaningful but not available here.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// Memory or another resource could not be obtained.
    #[error("Allocation failed: {0}")]
    Allocation(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    OsFailure,
    Unsupported,
    AllocationFailure,
}

impl ErrorKind {
    /// The numeric code used by the flat C-style surface (`0` is success).
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidArgument => -1,
            ErrorKind::OsFailure => -2,
            ErrorKind::AllocationFailure => -3,
            ErrorKind::Unsupported => -4,
        }
    }
}

impl Error {
    /// Create an InvalidArgument error from a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an Unsupported error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Capture the calling thread's last OS error.
    ///
    /// Must be called immediately after the failing system call, before
    /// anything else can overwrite `errno` / `GetLastError`.
    pub fn last_os(context: &'static str) -> Self {
        Self::Os {
            context,
            source: io::Error::last_os_error(),
        }
    }

    /// Wrap an already captured OS error.
    pub fn os(context: &'static str, source: io::Error) -> Self {
        Self::Os { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Os { .. } => ErrorKind::OsFailure,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Allocation(_) => ErrorKind::AllocationFailure,
        }
    }

    /// Raw OS error code carried by an [`Error::Os`], if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Error::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Os { source, .. } => source,
            Error::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            Error::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            Error::Allocation(msg) => io::Error::new(io::ErrorKind::OutOfMemory, msg),
        }
    }
}

/// Result type for serial operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The calling thread's last OS error code (`errno` on POSIX, `GetLastError` on Windows).
pub fn last_error_code() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// System message for the calling thread's last OS error.
pub fn last_error_message() -> String {
    let err = io::Error::last_os_error();
    let text = err.to_string();
    // std appends " (os error N)"; callers want the bare system text
    match text.rfind(" (os error ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
