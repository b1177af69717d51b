//! Subscriber setup for the command line tool and demos.
//!
//! The library itself only emits `tracing` events; nothing is printed
//! unless a binary calls [`init_logging`].

use crate::config::{LogFormat, LoggingConfig};
use crate::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Filter directive for `verbosity` extra `-v` flags on top of `base`.
pub fn filter_directive(base: &str, verbosity: u8) -> String {
    match verbosity {
        0 => base.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install a global stderr subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is
/// harmless; the second subscriber is discarded.
pub fn init_logging(config: &LoggingConfig, verbosity: u8) {
    let directive = filter_directive(&config.level, verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json()
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .pretty()
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(filter)
            .boxed(),
    };

    if Registry::default().with(layer).try_init().is_err() {
        tracing::debug!("global subscriber already installed");
    }

    if config.debug_sink {
        debug::set_debug_handler(Some(debug::stderr_debug_handler));
    }
}
