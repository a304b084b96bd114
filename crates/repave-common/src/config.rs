//! Configuration for a synthesis run
//!
//! One `RepaveConfig` is handed to every stack builder. Values that couple two
//! stacks (the environment tag, the document name, the config bucket) exist
//! only here, so the instance label and the send-command filter are always
//! read from the same field.
//!
//! The file format is JSON. Every field has a default, so an empty object (or
//! no file at all) reproduces the original environment. Validation is done
//! via `garde::Validate`.

use crate::defaults::*;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Characters that would break the single- or double-quoted shell words the
/// build commands interpolate values into
const SHELL_FORBIDDEN: &[char] = &[
    '\'', '"', '\\', '`', '$', '\n', '\r', ' ', '\t', ';', '&', '|', '<', '>',
];

/// Reject values that are unsafe to interpolate into the build commands
fn shell_safe(value: &str, _ctx: &()) -> garde::Result {
    if let Some(bad) = value.chars().find(|c| SHELL_FORBIDDEN.contains(c)) {
        return Err(garde::Error::new(format!(
            "contains forbidden character: {bad:?}"
        )));
    }
    Ok(())
}

/// S3 bucket naming rules: 3-63 chars of `a-z0-9.-`, alphanumeric at both ends
fn bucket_name(value: &str, _ctx: &()) -> garde::Result {
    if !(3..=63).contains(&value.len()) {
        return Err(garde::Error::new("must be between 3 and 63 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(garde::Error::new(
            "may only contain lowercase letters, digits, '-' and '.'",
        ));
    }
    let ends_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !ends_ok(value.chars().next()) || !ends_ok(value.chars().last()) {
        return Err(garde::Error::new("must start and end with a letter or digit"));
    }
    Ok(())
}

/// Stack names, in synthesis order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct StackNames {
    #[serde(default = "default_compute_stack")]
    #[garde(length(min = 1, max = 128))]
    pub compute: String,

    #[serde(default = "default_pipeline_stack")]
    #[garde(length(min = 1, max = 128))]
    pub pipeline: String,

    #[serde(default = "default_document_stack")]
    #[garde(length(min = 1, max = 128))]
    pub document: String,
}

impl Default for StackNames {
    fn default() -> Self {
        Self {
            compute: default_compute_stack(),
            pipeline: default_pipeline_stack(),
            document: default_document_stack(),
        }
    }
}

/// The tag that labels the instance and selects the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct TagConfig {
    #[serde(default = "default_environment_tag_key")]
    #[garde(length(min = 1, max = 128), custom(shell_safe))]
    pub key: String,

    #[serde(default = "default_environment_tag_value")]
    #[garde(length(min = 1, max = 256), custom(shell_safe))]
    pub value: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            key: default_environment_tag_key(),
            value: default_environment_tag_value(),
        }
    }
}

/// Compute target settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct ComputeConfig {
    /// EC2 instance type
    #[serde(default = "default_instance_type")]
    #[garde(length(min = 1))]
    pub instance_type: String,

    /// VPC address space
    #[serde(default = "default_vpc_cidr")]
    #[garde(length(min = 9))]
    pub vpc_cidr: String,

    /// Availability zones the public subnets span
    #[serde(default = "default_max_azs")]
    #[garde(range(min = 1, max = 6))]
    pub max_azs: u8,

    /// SSM parameter resolving to the AMI id
    #[serde(default = "default_ami_parameter")]
    #[garde(length(min = 1))]
    pub ami_parameter: String,

    /// Environment tag carried by the instance
    #[serde(default)]
    #[garde(dive)]
    pub environment_tag: TagConfig,

    /// Bootstrap script, relative to the config file
    #[serde(default = "default_user_data_path")]
    #[garde(length(min = 1))]
    pub user_data_path: String,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            instance_type: default_instance_type(),
            vpc_cidr: default_vpc_cidr(),
            max_azs: default_max_azs(),
            ami_parameter: default_ami_parameter(),
            environment_tag: TagConfig::default(),
            user_data_path: default_user_data_path(),
        }
    }
}

/// GitHub repository the pipeline pulls from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default = "default_source_owner")]
    #[garde(length(min = 1))]
    pub owner: String,

    #[serde(default = "default_source_repo")]
    #[garde(length(min = 1))]
    pub repo: String,

    #[serde(default = "default_source_branch")]
    #[garde(length(min = 1))]
    pub branch: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            owner: default_source_owner(),
            repo: default_source_repo(),
            branch: default_source_branch(),
        }
    }
}

/// A field of a Secrets Manager secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct SecretConfig {
    #[serde(default = "default_oauth_secret_id")]
    #[garde(length(min = 1, max = 512))]
    pub secret_id: String,

    #[serde(default = "default_oauth_secret_field")]
    #[garde(length(min = 1))]
    pub json_field: String,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            secret_id: default_oauth_secret_id(),
            json_field: default_oauth_secret_field(),
        }
    }
}

/// Parameters forwarded to `ssm send-command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    #[serde(default = "default_document_version")]
    #[garde(length(min = 1), custom(shell_safe))]
    pub document_version: String,

    #[serde(default = "default_command_timeout_seconds")]
    #[garde(range(min = 30, max = 2592000))]
    pub timeout_seconds: u32,

    #[serde(default = "default_max_concurrency")]
    #[garde(range(min = 1))]
    pub max_concurrency: u32,

    #[serde(default = "default_max_errors")]
    #[garde(skip)]
    pub max_errors: u32,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            document_version: default_document_version(),
            timeout_seconds: default_command_timeout_seconds(),
            max_concurrency: default_max_concurrency(),
            max_errors: default_max_errors(),
        }
    }
}

/// Config-distribution pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Bucket receiving the agent configuration
    #[serde(default = "default_config_bucket")]
    #[garde(custom(bucket_name))]
    pub config_bucket: String,

    /// File the build uploads to the bucket
    #[serde(default = "default_agent_config_file")]
    #[garde(length(min = 1), custom(shell_safe))]
    pub agent_config_file: String,

    #[serde(default)]
    #[garde(dive)]
    pub source: SourceConfig,

    /// Secret field holding the GitHub token
    #[serde(default)]
    #[garde(dive)]
    pub oauth_secret: SecretConfig,

    /// CodeBuild image
    #[serde(default = "default_build_image")]
    #[garde(length(min = 1))]
    pub build_image: String,

    #[serde(default)]
    #[garde(dive)]
    pub command: CommandConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_bucket: default_config_bucket(),
            agent_config_file: default_agent_config_file(),
            source: SourceConfig::default(),
            oauth_secret: SecretConfig::default(),
            build_image: default_build_image(),
            command: CommandConfig::default(),
        }
    }
}

/// Command document settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct DocumentConfig {
    /// Name the document is registered under (and invoked by)
    #[serde(default = "default_document_name")]
    #[garde(length(min = 3, max = 128), custom(shell_safe))]
    pub name: String,

    /// YAML body, relative to the config file
    #[serde(default = "default_document_path")]
    #[garde(length(min = 1))]
    pub path: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            name: default_document_name(),
            path: default_document_path(),
        }
    }
}

/// Configuration for a synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct RepaveConfig {
    /// Region the fleet command targets
    #[serde(default = "default_region")]
    #[garde(length(min = 1), custom(shell_safe))]
    pub region: String,

    /// Qualifier of the asset staging bucket
    #[serde(default = "default_asset_qualifier")]
    #[garde(length(min = 1, max = 10))]
    pub asset_qualifier: String,

    #[serde(default)]
    #[garde(dive)]
    pub stacks: StackNames,

    #[serde(default)]
    #[garde(dive)]
    pub compute: ComputeConfig,

    #[serde(default)]
    #[garde(dive)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    #[garde(dive)]
    pub document: DocumentConfig,
}

impl Default for RepaveConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            asset_qualifier: default_asset_qualifier(),
            stacks: StackNames::default(),
            compute: ComputeConfig::default(),
            pipeline: PipelineConfig::default(),
            document: DocumentConfig::default(),
        }
    }
}

impl RepaveConfig {
    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validated()
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Run `garde` validation, consuming and returning the config
    pub fn validated(self) -> Result<Self, ConfigError> {
        garde::Validate::validate(&self).map_err(|report| ConfigError::Invalid(report.to_string()))?;
        Ok(self)
    }

    /// The environment tag shared by the instance and the send-command targets
    pub fn environment_tag(&self) -> &TagConfig {
        &self.compute.environment_tag
    }

    /// Resolve a configured path against the directory holding the config file
    pub fn resolve_path(base_dir: &Path, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = RepaveConfig::from_json("{}").unwrap();
        assert_eq!(config, RepaveConfig::default());
        assert_eq!(config.compute.instance_type, "t3.nano");
        assert_eq!(config.environment_tag().key, "Environment");
        assert_eq!(config.environment_tag().value, "CWAgentRepave00");
        assert_eq!(config.document.name, "ssm_document_cloudwatch_agent");
        assert_eq!(config.pipeline.config_bucket, "vr-labs-cloudwatch-agent-config");
        assert_eq!(config.pipeline.command.timeout_seconds, 600);
        assert_eq!(config.pipeline.command.max_concurrency, 50);
        assert_eq!(config.pipeline.command.max_errors, 0);
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = RepaveConfig::from_json(
            r#"{"compute": {"environment_tag": {"value": "CWAgentRepave01"}}}"#,
        )
        .unwrap();
        assert_eq!(config.environment_tag().value, "CWAgentRepave01");
        assert_eq!(config.environment_tag().key, "Environment");
        assert_eq!(config.compute.instance_type, "t3.nano");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "region": "us-west-2",
                "pipeline": {{
                    "config_bucket": "my-agent-config",
                    "command": {{ "max_concurrency": 10 }}
                }}
            }}"#
        )
        .unwrap();

        let config = RepaveConfig::load(file.path()).unwrap();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.pipeline.config_bucket, "my-agent-config");
        assert_eq!(config.pipeline.command.max_concurrency, 10);
        assert_eq!(config.pipeline.command.timeout_seconds, 600);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RepaveConfig::load(Path::new("/nonexistent/repave.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RepaveConfig::from_json(r#"{"regoin": "us-east-1"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_bucket_name() {
        let err =
            RepaveConfig::from_json(r#"{"pipeline": {"config_bucket": "Upper_Case"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("config_bucket"));
    }

    #[test]
    fn test_shell_injection_in_tag_rejected() {
        let err = RepaveConfig::from_json(
            r#"{"compute": {"environment_tag": {"value": "x'; rm -rf /; echo '"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = RepaveConfig::from_json(r#"{"pipeline": {"command": {"max_concurrency": 0}}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bucket_name_rules() {
        assert!(bucket_name("vr-labs-cloudwatch-agent-config", &()).is_ok());
        assert!(bucket_name("ab", &()).is_err());
        assert!(bucket_name("-leading-hyphen", &()).is_err());
        assert!(bucket_name("trailing-dot.", &()).is_err());
        assert!(bucket_name("has_underscore", &()).is_err());
    }

    #[test]
    fn test_shell_safe_accepts_plain_values() {
        assert!(shell_safe("CWAgentRepave00", &()).is_ok());
        assert!(shell_safe("config.json", &()).is_ok());
        assert!(shell_safe("us-east-1", &()).is_ok());
        assert!(shell_safe("$(whoami)", &()).is_err());
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/work/infra");
        assert_eq!(
            RepaveConfig::resolve_path(base, "user_data.sh"),
            PathBuf::from("/work/infra/user_data.sh")
        );
        assert_eq!(
            RepaveConfig::resolve_path(base, "/abs/doc.yml"),
            PathBuf::from("/abs/doc.yml")
        );
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let example = include_str!("../../../repave.example.json");
        let config = RepaveConfig::from_json(example).unwrap();
        assert_eq!(config, RepaveConfig::default());
    }
}
