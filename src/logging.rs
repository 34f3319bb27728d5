use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::LFError;

/// The terminal belongs to the ui, so logs go to a file.
pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("locfilter.log")
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init(path: &Path) -> Result<(), LFError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .map_err(|e| LFError::LoadingFailed(format!("logging setup failed: {e}")))
}
