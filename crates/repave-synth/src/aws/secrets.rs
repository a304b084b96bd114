//! Secrets Manager existence checks

use super::context::AwsContext;
use super::error::classify_anyhow_error;
use crate::secrets::VerifiedSecrets;
use anyhow::{Context, Result, bail};
use aws_sdk_secretsmanager::Client;
use repave_common::SecretConfig;
use tracing::{debug, info};

pub struct SecretsClient {
    client: Client,
}

impl SecretsClient {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.secrets_client(),
        }
    }

    /// Confirm a secret exists without reading its value
    pub async fn describe(&self, secret_id: &str) -> Result<()> {
        let result = self
            .client
            .describe_secret()
            .secret_id(secret_id)
            .send()
            .await
            .with_context(|| format!("Failed to describe secret '{secret_id}'"));

        match result {
            Ok(output) => {
                debug!(secret = %secret_id, arn = ?output.arn(), "Secret exists");
                Ok(())
            }
            Err(e) if classify_anyhow_error(&e).is_not_found() => {
                bail!("Secret '{secret_id}' does not exist")
            }
            Err(e) => Err(e),
        }
    }

    /// Check every secret the stacks reference
    ///
    /// Fails on the first secret that is missing or unreadable.
    pub async fn verify_all(&self, secrets: &[&SecretConfig]) -> Result<VerifiedSecrets> {
        let mut verified = Vec::with_capacity(secrets.len());
        for secret in secrets {
            self.describe(&secret.secret_id).await?;
            verified.push(secret.secret_id.clone());
        }
        info!(count = verified.len(), "Verified referenced secrets");
        Ok(VerifiedSecrets::new(verified))
    }
}
