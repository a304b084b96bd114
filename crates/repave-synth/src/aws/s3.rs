//! S3 object access for asset publishing

use super::context::AwsContext;
use anyhow::{Context, Result};
use aws_sdk_s3::{Client, primitives::ByteStream};
use tracing::debug;

/// S3 client for the asset staging bucket
pub struct S3Client {
    client: Client,
    region: String,
}

impl S3Client {
    /// Create an S3 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Whether `s3://<bucket>/<key>` exists
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to check s3://{bucket}/{key}")),
        }
    }

    /// Upload bytes to S3
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        debug!(bucket = %bucket, key = %key, size = data.len(), "Uploading bytes");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .context("Failed to upload bytes")?;

        Ok(())
    }
}
