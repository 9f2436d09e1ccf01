mod logging;
mod run;

pub use logging::init_run_logging;
pub use run::{RunInfo, start_run, write_report};

use thiserror::Error;

/// Errors writing run artifacts.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to write run artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode run artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to install logging: {0}")]
    Logging(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
