//! CloudFormation template model
//!
//! A `Template` is the resource graph of one stack. Resources, parameters and
//! outputs are kept in sorted maps so the serialized template is byte-stable
//! across runs.

pub mod intrinsics;
pub mod logical_id;

pub use logical_id::logical_id;

use crate::error::{SynthError, SynthResult};
use repave_common::ResourceKind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// What happens to a resource when it is removed from the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    Delete,
    Retain,
}

impl RemovalPolicy {
    /// Whether the resource survives stack deletion
    pub fn leaves_residue(self) -> bool {
        !matches!(self, RemovalPolicy::Delete)
    }
}

/// One declared resource
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: ResourceKind,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            properties: Map::new(),
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Set a property
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Add an explicit dependency on another resource
    pub fn depends_on(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
            self.depends_on.sort();
        }
        self
    }

    /// Apply the same policy on replacement and on deletion
    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// A template parameter
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Export attached to an output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    pub name: String,
}

/// A template output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub value: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

/// The resource graph of one stack
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,

    resources: BTreeMap<String, Resource>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION,
            description: Some(description.into()),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Insert a resource. Returns false (and leaves the template untouched)
    /// if the logical id is already taken.
    pub fn insert_resource(&mut self, logical_id: &str, resource: Resource) -> bool {
        if self.resources.contains_key(logical_id) {
            return false;
        }
        self.resources.insert(logical_id.to_string(), resource);
        true
    }

    pub fn insert_parameter(&mut self, name: &str, parameter: Parameter) {
        self.parameters.insert(name.to_string(), parameter);
    }

    pub fn insert_output(&mut self, name: &str, output: Output) {
        self.outputs.insert(name.to_string(), output);
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(id, r)| (id.as_str(), r))
    }

    /// All resources of one kind
    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources().filter(move |(_, r)| r.kind == kind)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    /// Resources that would be left behind after the stack is deleted
    ///
    /// A resource is left behind if its deletion policy keeps it, or if it can
    /// hold data and no auto-delete resource empties it first.
    pub fn teardown_residue(&self) -> Vec<&str> {
        let emptied: HashSet<&str> = self
            .resources_of(ResourceKind::AutoDeleteObjects)
            .filter_map(|(_, r)| r.get("BucketName").and_then(intrinsics::referenced_id))
            .collect();

        self.resources()
            .filter(|(id, r)| {
                let retained = r.deletion_policy.is_some_and(RemovalPolicy::leaves_residue);
                let stranded = r.kind.holds_data() && !emptied.contains(id);
                retained || stranded
            })
            .map(|(id, _)| id)
            .collect()
    }

    pub fn to_json(&self) -> SynthResult<Value> {
        serde_json::to_value(self).map_err(|source| SynthError::Serialize {
            what: "template".to_string(),
            source,
        })
    }

    pub fn to_json_pretty(&self) -> SynthResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| SynthError::Serialize {
            what: "template".to_string(),
            source,
        })
    }
}
