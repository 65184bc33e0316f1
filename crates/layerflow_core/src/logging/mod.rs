//! Logging infrastructure for LayerFlow.
//!
//! This module provides:
//! - Per-job loggers with file + callback dual output
//! - Compact mode with progress filtering
//! - Tail buffer of renderer output for failure diagnosis
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use layerflow_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new(
//!     "3f2a9c",
//!     "/path/to/logs",
//!     LogConfig::default(),
//!     None,
//! ).unwrap();
//!
//! logger.phase("Staging");
//! logger.command("npx remotion render ExplodedUI out.mp4");
//! logger.progress(50);
//! logger.success("Render complete");
//! ```

mod job_logger;
mod types;

pub use job_logger::{JobLogger, JobLoggerBuilder};
pub use types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .init();
}
