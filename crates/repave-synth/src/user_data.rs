//! Instance user data
//!
//! Builds the first-boot script of a Linux instance as a `Fn::Base64` of a
//! `Fn::Join`, so lines can embed template expressions such as the asset
//! staging bucket name.

use crate::error::{SynthError, SynthResult};
use crate::template::intrinsics;
use serde_json::{Value, json};

const SHEBANG: &str = "#!/bin/bash";

/// Directory the S3 download commands write into
const DOWNLOAD_DIR: &str = "/tmp";

/// Validate that a value is safe inside a single-quoted bash word.
///
/// Rejects characters that could close the quote or start a new command
/// (`'`, `\`, newlines).
fn validate_shell_input(value: &str, field_name: &str) -> SynthResult<()> {
    const FORBIDDEN: &[char] = &['\'', '\\', '\n', '\r'];
    if value.is_empty() {
        return Err(SynthError::InvalidConfig(format!(
            "{field_name} cannot be empty"
        )));
    }
    if let Some(bad) = value.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(SynthError::InvalidConfig(format!(
            "{field_name} contains forbidden character: {bad:?}"
        )));
    }
    Ok(())
}

/// First-boot script of a Linux instance
#[derive(Debug, Clone)]
pub struct LinuxUserData {
    /// Each line is a list of fragments joined without separator
    lines: Vec<Vec<Value>>,
}

impl Default for LinuxUserData {
    fn default() -> Self {
        Self {
            lines: vec![vec![json!(SHEBANG)]],
        }
    }
}

impl LinuxUserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal commands
    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for command in commands {
            self.lines.push(vec![json!(command.into())]);
        }
    }

    /// Download `s3://<bucket>/<key>` to a local file and return its path
    pub fn add_s3_download_command(&mut self, bucket: Value, key: &str) -> SynthResult<String> {
        validate_shell_input(key, "bucket_key")?;
        let local_path = format!("{DOWNLOAD_DIR}/{key}");

        self.lines.push(vec![json!(format!(
            "mkdir -p $(dirname '{local_path}')"
        ))]);
        self.lines.push(vec![
            json!("aws s3 cp 's3://"),
            bucket,
            json!(format!("/{key}' '{local_path}'")),
        ]);
        Ok(local_path)
    }

    /// Make a local file executable and run it; the script stops on failure
    pub fn add_execute_file_command(&mut self, file_path: &str) -> SynthResult<()> {
        validate_shell_input(file_path, "file_path")?;
        self.add_commands([
            "set -e".to_string(),
            format!("chmod +x '{file_path}'"),
            format!("'{file_path}'"),
        ]);
        Ok(())
    }

    /// Render as the `UserData` property value
    pub fn render(&self) -> Value {
        let mut parts = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                parts.push(json!("\n"));
            }
            parts.extend(line.iter().cloned());
        }
        intrinsics::base64(intrinsics::join("", merge_literals(parts)))
    }
}

/// Collapse adjacent string fragments so the join stays short
fn merge_literals(parts: Vec<Value>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::with_capacity(parts.len());
    for part in parts {
        if let (Some(Value::String(prev)), Value::String(next)) = (merged.last_mut(), &part) {
            prev.push_str(next);
            continue;
        }
        merged.push(part);
    }
    merged
}
