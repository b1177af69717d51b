//! Pluggable debug sink.
//!
//! Every backend call is traced through `tracing`. The same lines can also be
//! routed to a plain string callback, which is what hosts without a tracing
//! subscriber use. The callback is process-wide and starts out unset.
//!
//! Register the handler once, before any thread starts doing serial I/O.
//! Swapping it while other threads are mid-call is memory-safe but those
//! calls may report to either handler.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Environment variable that enables [`default_debug_handler`] output.
pub const DEBUG_ENV: &str = "SERIALIO_DEBUG";

type Handler = Arc<dyn Fn(&str) + Send + Sync>;

static HANDLER: Lazy<RwLock<Option<Handler>>> = Lazy::new(|| RwLock::new(None));

/// Install (or with `None`, remove) the process-wide debug handler.
///
/// # Example
/// ```
/// serialio::set_debug_handler(Some(serialio::default_debug_handler));
/// serialio::set_debug_handler(None::<fn(&str)>);
/// ```
pub fn set_debug_handler<F>(handler: Option<F>)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let handler = handler.map(|f| Arc::new(f) as Handler);
    *HANDLER.write() = handler;
}

/// Print `sp: <message>` to stderr when `SERIALIO_DEBUG` is set.
pub fn default_debug_handler(message: &str) {
    if std::env::var_os(DEBUG_ENV).is_some() {
        eprintln!("sp: {}", message);
    }
}

/// Print `sp: <message>` to stderr unconditionally.
pub fn stderr_debug_handler(message: &str) {
    eprintln!("sp: {}", message);
}

/// Whether a string handler is currently installed.
pub fn has_debug_handler() -> bool {
    HANDLER.read().is_some()
}

#[doc(hidden)]
pub fn emit(args: fmt::Arguments<'_>) {
    // clone out so the handler runs without the lock held
    let handler = HANDLER.read().clone();
    if let Some(handler) = handler {
        handler(&args.to_string());
    }
}

/// Trace to both `tracing` and the string debug sink.
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        ::tracing::debug!($($arg)*);
        $crate::debug::emit(format_args!($($arg)*));
    }};
}

pub(crate) use debug_log;
