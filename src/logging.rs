use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::expand_path;
use crate::domain::LensError;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq)]
pub enum LogTarget {
    Stderr,
    File(String),
    /// No output, used by the terminal UI when no log file is configured.
    Silent,
}

/// Installs the global subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: &str, target: LogTarget) -> Result<(), LensError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let result = match target {
        LogTarget::Stderr => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(expand_path(&path))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        LogTarget::Silent => registry.try_init(),
    };
    result.map_err(|e| LensError::Config(format!("logging: {e}")))
}
