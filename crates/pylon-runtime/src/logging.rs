//! Process-wide logging setup.
//!
//! A `tracing_subscriber` registry with an `EnvFilter` layer (honoring
//! `RUST_LOG` over the configured level) and a format layer chosen from
//! [`LogFormat`]. A `static` `AtomicBool` guard keeps a second call to
//! [`init`] — e.g. from a test harness that also boots the runtime — from
//! panicking on an already-installed global subscriber.

use pylon_config::{LogFormat, LoggingConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global `tracing` subscriber from `config`, unless one has
/// already been installed by an earlier call in this process.
pub fn init(config: &LoggingConfig) {
    if LOGGING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    for (module, level) in &config.filters {
        if let Ok(directive) = format!("{module}={}", level.as_str()).parse() {
            filter = filter.add_directive(directive);
        }
    }

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(fmt::layer().compact())
                .with(filter)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .init();
        }
    }
}

/// Returns whether a subscriber has already been installed by [`init`].
pub fn is_initialized() -> bool {
    LOGGING_INITIALIZED.load(Ordering::SeqCst)
}
