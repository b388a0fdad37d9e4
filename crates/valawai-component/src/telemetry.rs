//! Centralised tracing initialisation for VALAWAI components.
//!
//! Call [`init_tracing`] once at program start. It installs two layers on the
//! global subscriber:
//! - a console layer filtered by `RUST_LOG`, or `LogConfig::console_level`
//!   when `RUST_LOG` is not set, optionally emitting JSON;
//! - a file layer filtered by `LogConfig::file_level`, written through a
//!   rolling, non-blocking appender in `LogConfig::log_dir`.
//!
//! Safe to call more than once: only the first call installs a subscriber.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogRotation};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

fn console_layer(config: &LogConfig) -> BoxedLayer {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str()));

    if config.json {
        fmt::layer()
            .with_target(false)
            .json()
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer().with_target(false).with_filter(filter).boxed()
    }
}

fn file_layer(config: &LogConfig) -> Result<(BoxedLayer, WorkerGuard), String> {
    std::fs::create_dir_all(&config.log_dir)
        .map_err(|e| format!("cannot create {}: {e}", config.log_dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(&config.file_name)
        .max_log_files(config.max_files.max(1))
        .build(&config.log_dir)
        .map_err(|e| format!("cannot open log file: {e}"))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_filter(EnvFilter::new(config.file_level.as_str()))
        .boxed();
    Ok((layer, guard))
}

/// Initialise the global tracing subscriber.
///
/// Returns the guard of the file writer; keep it alive until exit so buffered
/// lines are flushed. Returns `None` when the file layer could not be set up
/// (the console layer is still installed) or when a subscriber already exists.
pub fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let mut layers = vec![console_layer(config)];

    let (guard, file_error) = match file_layer(config) {
        Ok((layer, guard)) => {
            layers.push(layer);
            (Some(guard), None)
        }
        Err(e) => (None, Some(e)),
    };

    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        return None;
    }

    match file_error {
        Some(error) => tracing::warn!(
            event = "telemetry.file_disabled",
            error = %error,
            "logging to console only"
        ),
        None => tracing::debug!(
            event = "telemetry.initialised",
            log_dir = %config.log_dir.display(),
            file = %config.file_name,
            rotation = %config.rotation,
        ),
    }

    guard
}
