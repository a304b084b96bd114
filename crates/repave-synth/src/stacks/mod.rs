//! The three stacks and the container they are built into
//!
//! - [`compute`]: network, instance role and instance
//! - [`pipeline`]: config bucket and delivery pipeline
//! - [`document`]: SSM command document
//! - [`auto_delete`]: custom resource emptying buckets on teardown
//! - [`network`]: VPC with a single public subnet tier

pub mod auto_delete;
pub mod compute;
pub mod document;
pub mod network;
pub mod pipeline;

pub use compute::{ComputeIdentity, ComputeTarget, ComputeTargetStack};
pub use document::CommandDocumentStack;
pub use pipeline::ConfigPipelineStack;

use crate::asset::FileAsset;
use crate::error::{SynthError, SynthResult};
use crate::template::{Output, Resource, Template};

/// A named, independently deployable collection of resources
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    template: Template,
    assets: Vec<FileAsset>,
    dependencies: Vec<String>,
}

impl Stack {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            template: Template::new(description),
            assets: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn template_mut(&mut self) -> &mut Template {
        &mut self.template
    }

    pub fn assets(&self) -> &[FileAsset] {
        &self.assets
    }

    /// Stacks that must be deployed before this one
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Add a resource, failing on a logical id collision
    pub fn add(&mut self, logical_id: &str, resource: Resource) -> SynthResult<()> {
        if self.template.insert_resource(logical_id, resource) {
            Ok(())
        } else {
            Err(SynthError::DuplicateLogicalId {
                stack: self.name.clone(),
                logical_id: logical_id.to_string(),
            })
        }
    }

    pub fn add_output(&mut self, name: &str, output: Output) {
        self.template.insert_output(name, output);
    }

    pub fn add_asset(&mut self, asset: FileAsset) {
        self.assets.push(asset);
    }

    pub fn add_dependency(&mut self, stack_name: &str) {
        if !self.dependencies.iter().any(|d| d == stack_name) {
            self.dependencies.push(stack_name.to_string());
        }
    }

    /// File name of the template inside the cloud assembly
    pub fn template_file_name(&self) -> String {
        format!("{}.template.json", self.name)
    }
}
