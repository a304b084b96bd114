//! AWS account identity

use super::context::AwsContext;
use anyhow::{Context, Result};
use tracing::info;

/// Strongly-typed AWS account ID (12-digit string)
///
/// Fills the `${AWS::AccountId}` placeholder of the asset staging bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    #[cfg(test)]
    pub fn new(s: String) -> Self {
        AccountId(s)
    }
}

/// Fetch the current AWS account ID via STS GetCallerIdentity
///
/// Requires no permissions beyond valid credentials, so this doubles as the
/// credential check before publishing.
pub async fn get_current_account_id(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(account_id = %account, "AWS account validated");

    Ok(AccountId(account.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_derefs_to_str() {
        let id = AccountId::new("123456789012".to_string());
        assert_eq!(id.len(), 12);
        assert_eq!(id.to_string(), "123456789012");
    }
}
