//! Configuration errors

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
