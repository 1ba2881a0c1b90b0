//! Configuration error types.

use thiserror::Error;

/// Errors that can occur when loading, validating or persisting config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write a config file.
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in a config file or update payload.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A config value failed validation.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn json_error_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err = ConfigError::Json(json_err);
        assert!(err.to_string().contains("parse config JSON"));
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue("max_iterations must be >= 1".into());
        assert_eq!(
            err.to_string(),
            "invalid config value: max_iterations must be >= 1"
        );
    }
}
