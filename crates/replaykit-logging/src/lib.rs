//! # replaykit-logging
//!
//! Two channels, both on stderr:
//!
//! - `tracing` diagnostics from `replaykit-core` (classification counts,
//!   window corrections, legacy divergence), filtered by [`init_tracing`].
//! - [`LogEvent`] milestones the CLI emits through [`Logger`]: a bundle was
//!   loaded or is still incomplete, a correction was applied, the legacy
//!   window disagreed, hydration failed, a reader was built.
//!
//! [`Logger`] also implements the core's error sink, so a hydration failure
//! caught by the construction guard lands in the same stream (and in the
//! optional JSON lines file) as every other milestone.

mod events;

pub use events::{LogEvent, LogFormat, Logger};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(layer.json()).init(),
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Pretty => registry.with(layer).init(),
    }
}
