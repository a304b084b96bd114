//! Synthesis errors
//!
//! Synthesis is all-or-nothing: any of these aborts the run before the cloud
//! assembly is written.

use repave_common::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or writing the stacks
#[derive(Debug, Error)]
pub enum SynthError {
    /// A stack was built before the stack it reads a value from
    #[error("{consumer} requires {reference}, which has not been created yet")]
    MissingReference {
        consumer: String,
        reference: &'static str,
    },

    /// The same stack was added twice
    #[error("Stack '{0}' was already added")]
    DuplicateStack(String),

    /// Two resources in one template share a logical id
    #[error("Duplicate logical id '{logical_id}' in stack '{stack}'")]
    DuplicateLogicalId { stack: String, logical_id: String },

    /// The bootstrap script (or another file asset) is missing
    #[error("Asset file not found: {}", path.display())]
    AssetNotFound { path: PathBuf },

    /// The command document file is missing
    #[error("Command document not found: {origin}")]
    DocumentNotFound { origin: String },

    /// The command document is not valid YAML
    #[error("Failed to parse command document {origin}: {source}")]
    DocumentParse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The command document does not match the command-document schema
    #[error("Invalid command document {origin}: {reason}")]
    DocumentSchema { origin: String, reason: String },

    /// A referenced secret could not be resolved
    #[error("Secret '{secret_id}' is not available: {reason}")]
    SecretUnavailable { secret_id: String, reason: String },

    /// A configuration value cannot be turned into resources
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading or writing the cloud assembly failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template or manifest failed to serialize
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SynthError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a schema error for a command document
    pub fn schema(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentSchema {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn is_missing_reference(&self) -> bool {
        matches!(self, SynthError::MissingReference { .. })
    }
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reference_display() {
        let err = SynthError::MissingReference {
            consumer: "codebuild-pipeline".to_string(),
            reference: "the compute identity",
        };
        assert_eq!(
            err.to_string(),
            "codebuild-pipeline requires the compute identity, which has not been created yet"
        );
        assert!(err.is_missing_reference());
    }

    #[test]
    fn test_asset_not_found_names_path() {
        let err = SynthError::AssetNotFound {
            path: PathBuf::from("/infra/user_data.sh"),
        };
        assert!(err.to_string().contains("/infra/user_data.sh"));
        assert!(!err.is_missing_reference());
    }

    #[test]
    fn test_io_error_names_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SynthError::io("cdk.out/manifest.json", io_err);
        assert!(err.to_string().contains("cdk.out/manifest.json"));
    }
}
