//! Tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::LogFormat, MatrixonError, Result, TimelineConfig};

/// Installs the global tracing subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured filter when set.
pub fn init_tracing(config: &TimelineConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log)
            .map_err(|e| MatrixonError::Config(format!("invalid log filter: {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    installed.map_err(|e| MatrixonError::Internal(format!("tracing already initialised: {e}")))
}
