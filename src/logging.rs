//! File-based logging module
//!
//! Stdout belongs to the interactive prompts and the "now playing" feed, so
//! tracing output goes to a rolling log file instead.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "spotify-continuous";
const DEFAULT_FILTER: &str = "spotify_continuous=debug,rspotify=info,warn";

/// Initialize the logging system.
///
/// Logs are written to `.logs/spotify-continuous.YYYY-MM-DD.log` with daily
/// rotation. The level can be controlled via the `RUST_LOG` environment variable.
pub fn init_logging() -> anyhow::Result<()> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes on drop; keep it for the whole process lifetime
    Box::leak(Box::new(guard));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", LOG_DIR);

    Ok(())
}

/// Log a Spotify API request and its result
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "API request successful"),
            Err(e) => tracing::warn!(operation = $operation, error = %e, "API request failed"),
        }
    };
}

/// Log a Spotify API request with additional context
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API request started");
    };
    ($operation:expr, $($field:tt)+) => {
        tracing::debug!(operation = $operation, $($field)+, "API request started");
    };
}
