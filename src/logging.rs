//! Logging setup.
//!
//! Events go to stderr for interactive use and to a daily-rolling file so
//! long overnight syncs leave a trail.
//!
//! Log level is controlled via the `HOLIFEST_LOG` environment variable:
//! - `HOLIFEST_LOG=debug` for verbose output (per-request detail)
//! - `HOLIFEST_LOG=info` for standard output (default)
//! - `HOLIFEST_LOG=warn` for retries and errors only

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system. Call once at startup.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("HOLIFEST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("holifest")
            .join("logs")
    });
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "holifest.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the guard alive for the life of the process so buffered log
    // lines are flushed; init() runs once.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}
