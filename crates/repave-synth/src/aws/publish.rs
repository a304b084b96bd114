//! Upload staged assets to the bootstrapped staging bucket
//!
//! Object keys are content hashes, so an existing object is never uploaded
//! again. Throttled uploads are retried with exponential backoff.

use super::account::get_current_account_id;
use super::context::AwsContext;
use super::error::classify_anyhow_error;
use super::s3::S3Client;
use crate::asset::resolve_bucket_pattern;
use crate::assembly::{AssetEntry, CloudAssembly};
use anyhow::{Context, Result, bail};
use backon::{ExponentialBuilder, Retryable};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, warn};

const CONTENT_TYPE: &str = "application/octet-stream";

/// Outcome of a publish run, as `s3://bucket/key` URIs
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

impl PublishReport {
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.skipped.len()
    }
}

/// Read a staged asset and check it still matches the manifest
async fn read_staged(assembly: &CloudAssembly, asset: &AssetEntry) -> Result<Vec<u8>> {
    let path = assembly.asset_path(asset);
    let contents = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read staged asset {}", path.display()))?;

    let hash = hex::encode(Sha256::digest(&contents));
    if hash != asset.hash {
        bail!(
            "Staged asset {} changed since synthesis (expected {}, found {hash}); run synth again",
            path.display(),
            asset.hash
        );
    }
    Ok(contents)
}

/// Publish every asset of the assembly to the current account's staging bucket
pub async fn publish_assets(ctx: &AwsContext, assembly: &CloudAssembly) -> Result<PublishReport> {
    let account = get_current_account_id(ctx).await?;
    let s3 = S3Client::from_context(ctx);
    let mut report = PublishReport::default();

    for asset in &assembly.manifest().assets {
        let bucket = resolve_bucket_pattern(&asset.bucket, &account, s3.region());
        let key = asset.object_key.as_str();
        let uri = format!("s3://{bucket}/{key}");

        if s3.object_exists(&bucket, key).await? {
            info!(asset = %asset.id, uri = %uri, "Asset already published, skipping");
            report.skipped.push(uri);
            continue;
        }

        let contents = read_staged(assembly, asset).await?;
        let size = contents.len();

        (|| async {
            s3.upload_bytes(&bucket, key, contents.clone(), CONTENT_TYPE)
                .await
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(20))
                .with_max_times(5),
        )
        .when(|e| classify_anyhow_error(e).is_retryable())
        .notify(|e, dur| {
            warn!(
                uri = %uri,
                delay = ?dur,
                error = %e,
                "Asset upload throttled, retrying..."
            );
        })
        .await
        .with_context(|| format!("Failed to publish asset '{}' to {uri}", asset.id))?;

        info!(asset = %asset.id, uri = %uri, size, "Published asset");
        report.uploaded.push(uri);
    }

    Ok(report)
}
