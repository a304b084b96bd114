//! AWS error classification
//!
//! Classifies SDK errors by their `.code()` so the publish and verify paths
//! can tell missing resources and throttling apart from real failures.

use thiserror::Error;

/// AWS error categories for retry and skip logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Bucket, object or secret does not exist
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Credentials lack a permission
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AwsError::Throttled)
    }

    /// A hint for resolving this error, if one is known
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AwsError::AccessDenied { .. } => {
                Some("Check that the credentials in use may read and write the bucket or secret.")
            }
            AwsError::NotFound { .. } => {
                Some("Is the account bootstrapped and does the secret exist in this region?")
            }
            _ => None,
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchKey",
    "NotFound",
    "ResourceNotFoundException",
];

const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AccessDeniedException", "Forbidden"];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "SlowDown",
    "TooManyRequestsException",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an `anyhow::Error` by the first AWS SDK error in its chain.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    use aws_sdk_s3::error::ProvideErrorMetadata;

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<aws_sdk_s3::error::SdkError<
            aws_sdk_s3::operation::put_object::PutObjectError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return classify_aws_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_s3::error::SdkError<
            aws_sdk_s3::operation::head_object::HeadObjectError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return classify_aws_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_secretsmanager::error::SdkError<
            aws_sdk_secretsmanager::operation::describe_secret::DescribeSecretError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return classify_aws_error(meta.code(), meta.message());
        }
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
        }
    }

    #[test]
    fn access_denied_has_suggestion() {
        let err = classify_aws_error(Some("AccessDenied"), Some("no"));
        assert!(matches!(err, AwsError::AccessDenied { .. }));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { code: Some(_), .. }));
        assert!(err.suggestion().is_none());

        let err = classify_aws_error(None, None);
        assert!(matches!(err, AwsError::Sdk { code: None, ref message } if message == "Unknown error"));
    }

    #[test]
    fn plain_anyhow_error_is_sdk() {
        let err = anyhow::anyhow!("connection refused");
        assert!(matches!(classify_anyhow_error(&err), AwsError::Sdk { code: None, .. }));
    }
}
