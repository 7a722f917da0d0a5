//! Tracing subscriber setup
//!
//! Console output always goes through a `fmt` layer. When
//! [`LoggingConfig::file_dir`] is set, a second `fmt` layer writes to a daily
//! rolling file through a non-blocking writer, so compute units and the
//! frame loop never wait on disk I/O.
//!
//! `RUST_LOG` takes precedence over the configured filter.

use crate::config::LoggingConfig;
use crate::error::{Result, SatMeshError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, otherwise the configured directives
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber
///
/// Returns the file writer's guard when file logging is enabled; buffered
/// lines are flushed when it is dropped, so keep it alive until exit.
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &config.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                SatMeshError::Config(format!("Failed to create log directory {:?}: {}", dir, e))
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer().with_ansi(config.ansi))
        .with(file_layer)
        .try_init()
        .map_err(|e| SatMeshError::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    if let Some(dir) = &config.file_dir {
        tracing::info!("Logging to {:?}", dir);
    }
    Ok(guard)
}
