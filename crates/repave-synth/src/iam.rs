//! IAM policy documents and role helpers

use crate::error::{SynthError, SynthResult};
use crate::template::intrinsics::{self, partition_arn};
use crate::template::{Resource, logical_id};
use repave_common::ResourceKind;
use serde::Serialize;
use serde_json::{Value, json};

const POLICY_VERSION: &str = "2012-10-17";

pub const EC2_SERVICE: &str = "ec2.amazonaws.com";
pub const CODEBUILD_SERVICE: &str = "codebuild.amazonaws.com";
pub const CODEPIPELINE_SERVICE: &str = "codepipeline.amazonaws.com";
pub const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

/// Principals of a resource-policy statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Principals {
    #[serde(rename = "Service", skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,

    #[serde(rename = "AWS", skip_serializing_if = "Vec::is_empty")]
    pub arns: Vec<Value>,
}

impl Principals {
    /// Number of distinct principals named
    pub fn len(&self) -> usize {
        self.services.len() + self.arns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One policy statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principals>,

    pub action: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action: Vec::new(),
            resource: Vec::new(),
        }
    }

    pub fn sid(mut self, sid: &str) -> Self {
        self.sid = Some(sid.to_string());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resources<I, V>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.resource.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn service_principal(mut self, service: &str) -> Self {
        self.principal
            .get_or_insert_with(Principals::default)
            .services
            .push(service.to_string());
        self
    }

    pub fn arn_principal(mut self, arn: Value) -> Self {
        self.principal
            .get_or_insert_with(Principals::default)
            .arns
            .push(arn);
        self
    }
}

/// A policy document (identity, trust or resource policy)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    version: &'static str,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement: statements,
        }
    }

    /// Trust policy letting an AWS service assume a role
    pub fn assume_role(service: &str) -> Self {
        Self::new(vec![
            PolicyStatement::allow()
                .actions(["sts:AssumeRole"])
                .service_principal(service),
        ])
    }

    pub fn to_value(&self) -> SynthResult<Value> {
        serde_json::to_value(self).map_err(|source| SynthError::Serialize {
            what: "policy document".to_string(),
            source,
        })
    }
}

/// ARN of an AWS managed policy, partition-independent
pub fn managed_policy_arn(name: &str) -> Value {
    partition_arn(&format!("iam::aws:policy/{name}"))
}

/// A role resource assumed by `service` with the given managed policies
pub fn service_role(service: &str, managed_policies: Vec<Value>) -> SynthResult<Resource> {
    let mut role = Resource::new(ResourceKind::IamRole).property(
        "AssumeRolePolicyDocument",
        PolicyDocument::assume_role(service).to_value()?,
    );
    if !managed_policies.is_empty() {
        role = role.property("ManagedPolicyArns", managed_policies);
    }
    Ok(role)
}

/// An inline `AWS::IAM::Policy` attached to one role
///
/// Returns the logical id and the resource. The policy name follows the
/// construct path so two default policies in one stack never collide.
pub fn default_policy(
    role_path: &str,
    role_logical_id: &str,
    statements: Vec<PolicyStatement>,
) -> SynthResult<(String, Resource)> {
    let id = logical_id(&[role_path, "DefaultPolicy"]);
    let resource = Resource::new(ResourceKind::IamPolicy)
        .property("PolicyDocument", PolicyDocument::new(statements).to_value()?)
        .property("PolicyName", id.clone())
        .property("Roles", json!([intrinsics::reference(role_logical_id)]));
    Ok((id, resource))
}

/// `arn:aws:s3:::<bucket>` and `arn:aws:s3:::<bucket>/*` for a bucket resource
pub fn bucket_arns(bucket_logical_id: &str) -> [Value; 2] {
    let arn = intrinsics::get_att(bucket_logical_id, "Arn");
    let objects = intrinsics::join("", vec![arn.clone(), json!("/*")]);
    [arn, objects]
}
