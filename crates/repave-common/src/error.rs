//! Configuration loading and validation errors

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse JSON configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// One or more fields failed validation
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::io("/path/to/repave.json", io_err);
        assert!(err.to_string().contains("/path/to/repave.json"));
    }

    #[test]
    fn test_invalid_display() {
        let err = ConfigError::Invalid("pipeline.config_bucket: too short".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid config: pipeline.config_bucket: too short"
        );
    }
}
