//! CodeBuild build spec for the deploy stage
//!
//! The build runs exactly two commands: copy the agent configuration into the
//! config bucket, then send the command document to every instance carrying
//! the environment tag.

use crate::error::{SynthError, SynthResult};
use repave_common::{RepaveConfig, tags};
use serde::Serialize;
use serde_json::json;

const BUILD_SPEC_VERSION: &str = "0.2";

/// `aws ssm send-command` invocation targeting the fleet by tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCommand {
    pub document_name: String,
    pub document_version: String,
    pub tag_key: String,
    pub tag_value: String,
    pub timeout_seconds: u32,
    pub max_concurrency: u32,
    pub max_errors: u32,
    pub region: String,
}

impl SendCommand {
    /// Take every value from the shared config, so the target tag is always
    /// the one the instance carries
    pub fn from_config(config: &RepaveConfig) -> Self {
        let command = &config.pipeline.command;
        Self {
            document_name: config.document.name.clone(),
            document_version: command.document_version.clone(),
            tag_key: config.environment_tag().key.clone(),
            tag_value: config.environment_tag().value.clone(),
            timeout_seconds: command.timeout_seconds,
            max_concurrency: command.max_concurrency,
            max_errors: command.max_errors,
            region: config.region.clone(),
        }
    }

    /// The `--targets` JSON
    pub fn targets_json(&self) -> SynthResult<String> {
        let targets = json!([{
            "Key": tags::ssm_target_key(&self.tag_key),
            "Values": [self.tag_value],
        }]);
        serde_json::to_string(&targets).map_err(|source| SynthError::Serialize {
            what: "send-command targets".to_string(),
            source,
        })
    }

    /// Render the shell command line
    pub fn render(&self) -> SynthResult<String> {
        Ok(format!(
            "aws ssm send-command --document-name \"{}\" --document-version \"{}\" \
             --targets '{}' --parameters '{{}}' --timeout-seconds {} \
             --max-concurrency \"{}\" --max-errors \"{}\" --region {}",
            self.document_name,
            self.document_version,
            self.targets_json()?,
            self.timeout_seconds,
            self.max_concurrency,
            self.max_errors,
            self.region,
        ))
    }
}

/// `aws s3 cp <file> s3://<bucket>/`
pub fn upload_command(file: &str, bucket: &str) -> String {
    format!("aws s3 cp {file} s3://{bucket}/")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phases {
    pub build: Phase,
}

/// A CodeBuild build spec
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSpec {
    pub version: &'static str,
    pub phases: Phases,
}

impl BuildSpec {
    /// Build spec of the config deploy stage
    pub fn for_config(config: &RepaveConfig) -> SynthResult<Self> {
        let upload = upload_command(
            &config.pipeline.agent_config_file,
            &config.pipeline.config_bucket,
        );
        let send = SendCommand::from_config(config).render()?;
        Ok(Self {
            version: BUILD_SPEC_VERSION,
            phases: Phases {
                build: Phase {
                    commands: vec![upload, send],
                },
            },
        })
    }

    pub fn commands(&self) -> &[String] {
        &self.phases.build.commands
    }

    /// Serialized form stored in the project's `Source.BuildSpec`
    pub fn to_json_string(&self) -> SynthResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| SynthError::Serialize {
            what: "build spec".to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_commands_match_deployed_pipeline() {
        let spec = BuildSpec::for_config(&RepaveConfig::default()).unwrap();
        assert_eq!(
            spec.commands(),
            &[
                "aws s3 cp config.json s3://vr-labs-cloudwatch-agent-config/".to_string(),
                "aws ssm send-command --document-name \"ssm_document_cloudwatch_agent\" \
                 --document-version \"1\" \
                 --targets '[{\"Key\":\"tag:Environment\",\"Values\":[\"CWAgentRepave00\"]}]' \
                 --parameters '{}' --timeout-seconds 600 --max-concurrency \"50\" \
                 --max-errors \"0\" --region us-east-1"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_target_follows_environment_tag() {
        let mut config = RepaveConfig::default();
        config.compute.environment_tag.value = "CWAgentRepave42".to_string();
        let send = SendCommand::from_config(&config);
        assert_eq!(
            send.targets_json().unwrap(),
            r#"[{"Key":"tag:Environment","Values":["CWAgentRepave42"]}]"#
        );
    }

    #[test]
    fn test_serialized_spec_shape() {
        let spec = BuildSpec::for_config(&RepaveConfig::default()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&spec.to_json_string().unwrap()).unwrap();
        assert_eq!(value["version"], "0.2");
        assert_eq!(value["phases"]["build"]["commands"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_upload_command() {
        assert_eq!(
            upload_command("config.json", "bucket"),
            "aws s3 cp config.json s3://bucket/"
        );
    }
}
