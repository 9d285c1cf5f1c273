//! Logging setup and configuration

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingSettings;

pub const STATUS_DIR: &str = "output/status";

pub struct LoggingGuard {
    pub _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Console plus hourly rolling file output. Keep the guard alive for the
/// whole process or buffered file lines are lost.
pub fn setup_logging(settings: &LoggingSettings) -> Result<Arc<LoggingGuard>> {
    let file_appender = tracing_appender::rolling::hourly(&settings.directory, &settings.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_ansi(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(false)
            .compact()
            .boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(true)
                .with_level(true),
        )
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .try_init()?;

    Ok(Arc::new(LoggingGuard { _guard: guard }))
}

pub fn setup_output_directories(settings: &LoggingSettings) -> Result<()> {
    fs::create_dir_all(&settings.directory)?;
    fs::create_dir_all(STATUS_DIR)?;
    Ok(())
}
