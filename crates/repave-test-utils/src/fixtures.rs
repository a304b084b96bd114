//! Temporary project directories

use repave_common::RepaveConfig;
use repave_common::defaults::{DEFAULT_DOCUMENT_PATH, DEFAULT_USER_DATA_PATH};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Bootstrap script written by [`Fixture::new`]
pub const USER_DATA: &str = "#!/bin/bash\nyum install -y amazon-cloudwatch-agent\n";

/// A schema 2.2 command document with one step
pub const VALID_DOCUMENT: &str = r#"---
schemaVersion: "2.2"
description: Apply the CloudWatch agent configuration
parameters: {}
mainSteps:
  - action: aws:runShellScript
    name: FetchAndApplyConfig
    inputs:
      runCommand:
        - aws s3 cp s3://vr-labs-cloudwatch-agent-config/config.json /opt/aws/amazon-cloudwatch-agent/etc/config.json
        - /opt/aws/amazon-cloudwatch-agent/bin/amazon-cloudwatch-agent-ctl -a fetch-config -m ec2 -s -c file:/opt/aws/amazon-cloudwatch-agent/etc/config.json
"#;

/// A project directory holding `user_data.sh` and the command document
///
/// The directory is removed when the fixture is dropped.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self::empty();
        fixture.write(DEFAULT_USER_DATA_PATH, USER_DATA);
        fixture.write(DEFAULT_DOCUMENT_PATH, VALID_DOCUMENT);
        fixture
    }

    /// A fixture with no files in it
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create fixture directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write (or overwrite) a file relative to the fixture root
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write fixture file");
        path
    }

    pub fn remove(&self, name: &str) {
        fs::remove_file(self.dir.path().join(name)).expect("Failed to remove fixture file");
    }

    pub fn user_data(&self) -> PathBuf {
        self.dir.path().join(DEFAULT_USER_DATA_PATH)
    }

    pub fn document(&self) -> PathBuf {
        self.dir.path().join(DEFAULT_DOCUMENT_PATH)
    }

    /// Assembly directory inside the fixture (not created)
    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("cdk.out")
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Default configuration, validated
pub fn test_config() -> RepaveConfig {
    RepaveConfig::default()
        .validated()
        .expect("Default configuration should be valid")
}

/// Parse a template file written by synthesis
pub fn read_template(path: &Path) -> Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).expect("Template should be valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_files_exist() {
        let fixture = Fixture::new();
        assert!(fixture.user_data().is_file());
        assert!(fixture.document().is_file());
        assert!(!fixture.out_dir().exists());
    }

    #[test]
    fn test_remove() {
        let fixture = Fixture::new();
        fixture.remove(DEFAULT_DOCUMENT_PATH);
        assert!(!fixture.document().exists());
    }
}
