//! Log sinks.
//!
//! The subscriber is installed once per process and writes to stdout and to
//! an append-only `arby.log` in the data directory. Each run then gets a set
//! of named spans (`global`, `centralized`, `opendex`) that act as the
//! parent of every event logged on behalf of that sink.

use std::fs;

use tracing::{info_span, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Keeps the non-blocking file writer flushing until dropped.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level when set. With `verbose` the
/// crate logs at debug regardless of both.
pub fn init_logging(config: &Config, verbose: bool) -> std::io::Result<LogGuard> {
    fs::create_dir_all(&config.data_dir)?;

    let file_appender = tracing_appender::rolling::never(&config.data_dir, "arby.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter = if verbose {
        EnvFilter::new("arby=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(LogGuard { _file: file_guard })
}

/// Named log sinks for one run.
#[derive(Debug, Clone)]
pub struct Loggers {
    /// Lifecycle and orchestration events.
    pub global: Span,
    /// Centralized venue events.
    pub centralized: Span,
    /// OpenDEX venue events.
    pub opendex: Span,
}

impl Loggers {
    /// Create the sinks for a run of `config`.
    pub fn new(config: &Config) -> Self {
        let pair = config.pair().pair_id();
        Self {
            global: info_span!("global", pair = %pair),
            centralized: info_span!("centralized", pair = %pair),
            opendex: info_span!("opendex", pair = %pair),
        }
    }

    /// Sinks without an enclosing span.
    pub fn detached() -> Self {
        Self {
            global: Span::none(),
            centralized: Span::none(),
            opendex: Span::none(),
        }
    }
}
