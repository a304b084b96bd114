//! Command document loading and validation
//!
//! The document body is read through a [`DocumentSource`], parsed as YAML and
//! checked against the parts of the SSM command-document schema that decide
//! whether SSM will accept it. The parsed content is kept as JSON so it can be
//! embedded verbatim in the `AWS::SSM::Document` resource.

use crate::error::{SynthError, SynthResult};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Schema versions SSM accepts for `Command` documents
const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.2", "2.0", "2.2"];

/// Supplies the raw text of a command document
pub trait DocumentSource {
    /// Human-readable origin used in errors and logs
    fn origin(&self) -> String;

    /// Read the document text
    fn read(&self) -> SynthResult<String>;
}

/// Reads the document from a local file
#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    path: PathBuf,
}

impl FileDocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for FileDocumentSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> SynthResult<String> {
        fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SynthError::DocumentNotFound {
                origin: self.origin(),
            },
            _ => SynthError::io(&self.path, e),
        })
    }
}

/// Serves a document held in memory
#[derive(Debug, Clone)]
pub struct InlineDocumentSource {
    name: String,
    text: String,
}

impl InlineDocumentSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

impl DocumentSource for InlineDocumentSource {
    fn origin(&self) -> String {
        format!("<{}>", self.name)
    }

    fn read(&self) -> SynthResult<String> {
        Ok(self.text.clone())
    }
}

/// A parsed, schema-checked command document
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDocument {
    schema_version: String,
    content: Value,
}

impl CommandDocument {
    /// Read, parse and validate a document
    pub fn load(source: &dyn DocumentSource) -> SynthResult<Self> {
        let origin = source.origin();
        let text = source.read()?;
        let document = Self::parse(&text, &origin)?;
        debug!(
            origin = %origin,
            schema_version = %document.schema_version,
            "Loaded command document"
        );
        Ok(document)
    }

    /// Parse and validate document text
    pub fn parse(text: &str, origin: &str) -> SynthResult<Self> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|source| SynthError::DocumentParse {
                origin: origin.to_string(),
                source,
            })?;
        let mut content = serde_json::to_value(yaml)
            .map_err(|e| SynthError::schema(origin, format!("not representable as JSON: {e}")))?;

        let Some(fields) = content.as_object() else {
            return Err(SynthError::schema(origin, "document must be a mapping"));
        };

        let schema_version = match fields.get("schemaVersion") {
            Some(Value::String(v)) => v.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => return Err(SynthError::schema(origin, "schemaVersion must be a string")),
            None => return Err(SynthError::schema(origin, "missing schemaVersion")),
        };
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&schema_version.as_str()) {
            return Err(SynthError::schema(
                origin,
                format!(
                    "unsupported schemaVersion '{schema_version}' (expected one of {})",
                    SUPPORTED_SCHEMA_VERSIONS.join(", ")
                ),
            ));
        }

        if schema_version == "1.2" {
            let has_plugins = fields
                .get("runtimeConfig")
                .and_then(Value::as_object)
                .is_some_and(|plugins| !plugins.is_empty());
            if !has_plugins {
                return Err(SynthError::schema(
                    origin,
                    "schemaVersion 1.2 requires a non-empty runtimeConfig",
                ));
            }
        } else {
            validate_main_steps(fields.get("mainSteps"), origin)?;
        }

        // SSM only accepts the version as a string
        if let Some(fields) = content.as_object_mut() {
            fields.insert(
                "schemaVersion".to_string(),
                Value::String(schema_version.clone()),
            );
        }

        Ok(Self {
            schema_version,
            content,
        })
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// The document body as embedded in the template
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Names of the `mainSteps`, in order (empty for 1.2 documents)
    pub fn step_names(&self) -> Vec<&str> {
        self.content
            .get("mainSteps")
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|step| step.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `mainSteps` must be a non-empty list of steps with unique names
fn validate_main_steps(steps: Option<&Value>, origin: &str) -> SynthResult<()> {
    let steps = match steps {
        Some(Value::Array(steps)) if !steps.is_empty() => steps,
        Some(Value::Array(_)) | None => {
            return Err(SynthError::schema(origin, "mainSteps must list at least one step"));
        }
        Some(_) => return Err(SynthError::schema(origin, "mainSteps must be a list")),
    };

    let mut names = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        let action = step.get("action").and_then(Value::as_str);
        let name = step.get("name").and_then(Value::as_str);
        let (Some(_), Some(name)) = (action, name) else {
            return Err(SynthError::schema(
                origin,
                format!("mainSteps[{i}] needs both 'action' and 'name'"),
            ));
        };
        if !names.insert(name) {
            return Err(SynthError::schema(
                origin,
                format!("duplicate step name '{name}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
schemaVersion: '2.2'
description: Reconfigure the CloudWatch agent
mainSteps:
  - action: aws:runShellScript
    name: fetchConfig
    inputs:
      runCommand:
        - aws s3 cp s3://vr-labs-cloudwatch-agent-config/config.json /tmp/config.json
  - action: aws:runShellScript
    name: restartAgent
    inputs:
      runCommand:
        - amazon-cloudwatch-agent-ctl -a fetch-config -m ec2 -s -c file:/tmp/config.json
"#;

    fn parse(text: &str) -> SynthResult<CommandDocument> {
        CommandDocument::parse(text, "<test>")
    }

    fn schema_reason(text: &str) -> String {
        match parse(text) {
            Err(SynthError::DocumentSchema { reason, .. }) => reason,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_document() {
        let doc = parse(VALID).unwrap();
        assert_eq!(doc.schema_version(), "2.2");
        assert_eq!(doc.step_names(), vec!["fetchConfig", "restartAgent"]);
        assert_eq!(
            doc.content()["description"],
            "Reconfigure the CloudWatch agent"
        );
    }

    #[test]
    fn test_unquoted_schema_version() {
        let doc = parse("schemaVersion: 2.2\nmainSteps:\n  - {action: a, name: b}\n").unwrap();
        assert_eq!(doc.schema_version(), "2.2");
        assert_eq!(doc.content()["schemaVersion"], "2.2");
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse("schemaVersion: '2.2'\nmainSteps: [unclosed\n").unwrap_err();
        assert!(matches!(err, SynthError::DocumentParse { .. }));
    }

    #[test]
    fn test_missing_schema_version() {
        assert_eq!(
            schema_reason("mainSteps:\n  - {action: a, name: b}\n"),
            "missing schemaVersion"
        );
    }

    #[test]
    fn test_unsupported_schema_version() {
        assert!(schema_reason("schemaVersion: '0.3'\nmainSteps: []\n").contains("unsupported"));
    }

    #[test]
    fn test_scalar_document() {
        assert_eq!(schema_reason("just a string"), "document must be a mapping");
    }

    #[test]
    fn test_empty_main_steps() {
        assert!(schema_reason("schemaVersion: '2.2'\nmainSteps: []\n").contains("at least one"));
    }

    #[test]
    fn test_step_without_name() {
        assert!(
            schema_reason("schemaVersion: '2.2'\nmainSteps:\n  - action: aws:runShellScript\n")
                .contains("mainSteps[0]")
        );
    }

    #[test]
    fn test_duplicate_step_names() {
        let text = "schemaVersion: '2.2'\nmainSteps:\n  - {action: a, name: x}\n  - {action: b, name: x}\n";
        assert!(schema_reason(text).contains("duplicate step name 'x'"));
    }

    #[test]
    fn test_schema_1_2_requires_runtime_config() {
        assert!(schema_reason("schemaVersion: '1.2'\n").contains("runtimeConfig"));
        let doc = parse(
            "schemaVersion: '1.2'\nruntimeConfig:\n  aws:runShellScript:\n    properties: []\n",
        )
        .unwrap();
        assert!(doc.step_names().is_empty());
    }

    #[test]
    fn test_missing_file_is_document_not_found() {
        let source = FileDocumentSource::new("/nonexistent/ssm_document_cloudwatch_agent.yml");
        let err = CommandDocument::load(&source).unwrap_err();
        assert!(matches!(err, SynthError::DocumentNotFound { .. }));
        assert!(err.to_string().contains("ssm_document_cloudwatch_agent.yml"));
    }

    #[test]
    fn test_inline_source() {
        let source = InlineDocumentSource::new("inline", VALID);
        assert_eq!(source.origin(), "<inline>");
        assert!(CommandDocument::load(&source).is_ok());
    }
}
