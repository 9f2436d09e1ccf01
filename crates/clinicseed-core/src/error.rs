use thiserror::Error;

/// Core error type shared across clinicseed crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record schema could not be compiled.
    #[error("invalid record schema '{name}': {message}")]
    InvalidSchema { name: String, message: String },
}

/// Convenience alias for results returned by clinicseed crates.
pub type Result<T> = std::result::Result<T, CoreError>;
