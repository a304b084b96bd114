//! AWS access for the optional pre- and post-synthesis steps
//!
//! - S3: publish staged assets to the bootstrapped staging bucket
//! - STS: account ID lookup for the staging bucket name
//! - Secrets Manager: confirm referenced secrets exist

pub mod account;
pub mod context;
pub mod error;
pub mod publish;
pub mod s3;
pub mod secrets;

pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use error::{AwsError, classify_anyhow_error, classify_aws_error};
pub use publish::{PublishReport, publish_assets};
pub use s3::S3Client;
pub use secrets::SecretsClient;
