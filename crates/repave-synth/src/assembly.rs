//! Cloud assembly output
//!
//! The assembly directory holds one template per stack, the staged file
//! assets and a `manifest.json` describing both. Every file is rendered in
//! memory before the first one is written, so a serialization failure never
//! leaves a partial assembly behind.

use crate::asset::staging_bucket_pattern;
use crate::error::{SynthError, SynthResult};
use crate::stacks::Stack;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_VERSION: &str = "1";

/// A stack as listed in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEntry {
    pub name: String,
    pub template_file: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Where a staged asset must be uploaded before deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub id: String,
    pub stack: String,
    /// File name inside the assembly directory
    pub file: String,
    pub hash: String,
    /// Staging bucket with `${AWS::AccountId}`/`${AWS::Region}` placeholders
    pub bucket: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub stacks: Vec<StackEntry>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

impl Manifest {
    fn for_stacks(stacks: &[Stack], qualifier: &str) -> Self {
        let entries = stacks
            .iter()
            .map(|stack| StackEntry {
                name: stack.name().to_string(),
                template_file: stack.template_file_name(),
                dependencies: stack.dependencies().to_vec(),
            })
            .collect();
        let assets = stacks
            .iter()
            .flat_map(|stack| {
                stack.assets().iter().map(|asset| AssetEntry {
                    id: asset.id().to_string(),
                    stack: stack.name().to_string(),
                    file: asset.staged_file_name(),
                    hash: asset.hash().to_string(),
                    bucket: staging_bucket_pattern(qualifier),
                    object_key: asset.object_key(),
                })
            })
            .collect();
        Self {
            version: MANIFEST_VERSION.to_string(),
            stacks: entries,
            assets,
        }
    }

    pub fn stack(&self, name: &str) -> Option<&StackEntry> {
        self.stacks.iter().find(|s| s.name == name)
    }
}

/// A cloud assembly on disk
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    dir: PathBuf,
    manifest: Manifest,
}

impl CloudAssembly {
    /// Render every stack and write the assembly to `dir`
    pub fn write(dir: &Path, stacks: &[Stack], qualifier: &str) -> SynthResult<Self> {
        let manifest = Manifest::for_stacks(stacks, qualifier);

        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        for stack in stacks {
            let template = stack.template().to_json_pretty()?;
            files.push((stack.template_file_name(), template.into_bytes()));
            for asset in stack.assets() {
                files.push((asset.staged_file_name(), asset.contents().to_vec()));
            }
        }
        let manifest_json =
            serde_json::to_string_pretty(&manifest).map_err(|source| SynthError::Serialize {
                what: MANIFEST_FILE.to_string(),
                source,
            })?;
        files.push((MANIFEST_FILE.to_string(), manifest_json.into_bytes()));

        fs::create_dir_all(dir).map_err(|e| SynthError::io(dir, e))?;
        for (name, contents) in &files {
            let path = dir.join(name);
            fs::write(&path, contents).map_err(|e| SynthError::io(&path, e))?;
            debug!(path = %path.display(), bytes = contents.len(), "Wrote assembly file");
        }

        info!(
            dir = %dir.display(),
            stacks = manifest.stacks.len(),
            assets = manifest.assets.len(),
            "Wrote cloud assembly"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    /// Open an assembly written by an earlier run
    pub fn load(dir: &Path) -> SynthResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| SynthError::io(&path, e))?;
        let manifest = serde_json::from_str(&text).map_err(|source| SynthError::Serialize {
            what: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn template_path(&self, stack_name: &str) -> Option<PathBuf> {
        self.manifest
            .stack(stack_name)
            .map(|entry| self.dir.join(&entry.template_file))
    }

    pub fn asset_path(&self, asset: &AssetEntry) -> PathBuf {
        self.dir.join(&asset.file)
    }
}
