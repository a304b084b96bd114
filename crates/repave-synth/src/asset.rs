//! File assets
//!
//! A file asset is a local file copied into the cloud assembly at synthesis
//! time and uploaded to the bootstrapped staging bucket before deployment.
//! Its object key is the SHA-256 of the content, so unchanged files are never
//! re-uploaded and changed files always get a new key.

use crate::error::{SynthError, SynthResult};
use crate::iam::PolicyStatement;
use crate::template::intrinsics;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Actions granted by [`FileAsset::read_statement`]
const READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

/// A local file staged for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAsset {
    id: String,
    source_path: PathBuf,
    hash: String,
    extension: Option<String>,
    contents: Vec<u8>,
}

impl FileAsset {
    /// Read and hash a local file
    pub fn stage(id: &str, path: &Path) -> SynthResult<Self> {
        let contents = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SynthError::AssetNotFound {
                path: path.to_path_buf(),
            },
            _ => SynthError::io(path, e),
        })?;
        let hash = hex::encode(Sha256::digest(&contents));
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());

        debug!(asset = %id, path = %path.display(), hash = %hash, "Staged file asset");

        Ok(Self {
            id: id.to_string(),
            source_path: path.to_path_buf(),
            hash,
            extension,
            contents,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Hex SHA-256 of the file contents
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Key of the object in the staging bucket (`<hash>.<ext>`)
    pub fn object_key(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{ext}", self.hash),
            None => self.hash.clone(),
        }
    }

    /// File name inside the cloud assembly (`asset.<hash>.<ext>`)
    pub fn staged_file_name(&self) -> String {
        format!("asset.{}", self.object_key())
    }

    /// Template expression for the staging bucket of the deploying account
    pub fn bucket_name(qualifier: &str) -> Value {
        intrinsics::sub(&staging_bucket_pattern(qualifier))
    }

    /// Statement granting read access to this asset
    pub fn read_statement(&self, qualifier: &str) -> PolicyStatement {
        let bucket_arn = intrinsics::join(
            "",
            vec![
                json!("arn:"),
                intrinsics::reference(intrinsics::PARTITION),
                json!(":s3:::"),
                Self::bucket_name(qualifier),
            ],
        );
        let objects_arn = intrinsics::join("", vec![bucket_arn.clone(), json!("/*")]);
        PolicyStatement::allow()
            .actions(READ_ACTIONS.iter().copied())
            .resources([bucket_arn, objects_arn])
    }
}

/// Staging bucket name with `${AWS::AccountId}` and `${AWS::Region}` placeholders
pub fn staging_bucket_pattern(qualifier: &str) -> String {
    format!("cdk-{qualifier}-assets-${{AWS::AccountId}}-${{AWS::Region}}")
}

/// Concrete staging bucket name for an account and region
pub fn staging_bucket_name(qualifier: &str, account_id: &str, region: &str) -> String {
    resolve_bucket_pattern(&staging_bucket_pattern(qualifier), account_id, region)
}

/// Fill the account and region placeholders of a bucket pattern
pub fn resolve_bucket_pattern(pattern: &str, account_id: &str, region: &str) -> String {
    pattern
        .replace("${AWS::AccountId}", account_id)
        .replace("${AWS::Region}", region)
}
