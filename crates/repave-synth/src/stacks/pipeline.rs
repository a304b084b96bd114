//! Config-distribution pipeline
//!
//! A push to the agent-config repository runs a CodeBuild stage that uploads
//! `config.json` to the config bucket and sends the command document to every
//! instance carrying the environment tag. The config bucket policy names the
//! compute identity, which is why this stack is built after the compute target.

use super::Stack;
use super::auto_delete;
use super::compute::ComputeIdentity;
use crate::build_spec::BuildSpec;
use crate::error::SynthResult;
use crate::iam::{
    self, CODEBUILD_SERVICE, CODEPIPELINE_SERVICE, EC2_SERVICE, PolicyDocument, PolicyStatement,
};
use crate::secrets::{ResolvedSecret, SecretResolver};
use crate::template::intrinsics;
use crate::template::{Output, RemovalPolicy, Resource, logical_id};
use repave_common::tags::{TAG_AUTO_DELETE_OBJECTS, Tag};
use repave_common::{RepaveConfig, ResourceKind};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::info;

const PIPELINE: &str = "MonitoringBlueprintAgentConfigPipeline";
const PROJECT: &str = "Cloudwatch Agent Config Deploy";
const EXECUTION_POLICY: &str = "Codebuild-Execution-Policy";
const EXECUTION_ROLE: &str = "Codebuild-Execution-role";

pub const SOURCE_STAGE: &str = "Source";
pub const SOURCE_ACTION: &str = "Source";
pub const DEPLOY_STAGE: &str = "Deploy_Cloudwatch_Agent_Config";
pub const DEPLOY_ACTION: &str = "Cloudwatch-Config-Deploy";

/// Actions the fleet and the build may perform on config objects
pub const CONFIG_BUCKET_ACTIONS: &[&str] = &["s3:PutObject", "s3:GetObject"];

/// Actions of the build role. Granted on `*`.
const EXECUTION_ACTIONS: &[&str] = &[
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
    "sns:Publish",
    "s3:PutObject",
    "s3:GetObject",
    "s3:GetObjectVersion",
    "s3:GetBucketAcl",
    "s3:GetBucketLocation",
    "codebuild:CreateReportGroup",
    "codebuild:CreateReport",
    "codebuild:UpdateReport",
    "codebuild:BatchPutTestCases",
    "codebuild:BatchPutCodeCoverages",
    "ssm:SendCommand",
];

const ARTIFACT_BUCKET_ACTIONS: &[&str] = &[
    "s3:GetObject*",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

const PROJECT_ACTIONS: &[&str] = &[
    "codebuild:BatchGetBuilds",
    "codebuild:StartBuild",
    "codebuild:StopBuild",
];

const BUILD_COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";
const BUILD_ENVIRONMENT_TYPE: &str = "LINUX_CONTAINER";
const CODEPIPELINE_TYPE: &str = "CODEPIPELINE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionCategory {
    Source,
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionOwner {
    #[serde(rename = "AWS")]
    Aws,
    ThirdParty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionTypeId {
    pub category: ActionCategory,
    pub owner: ActionOwner,
    pub provider: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactRef {
    pub name: String,
}

/// One action of a pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    pub action_type_id: ActionTypeId,
    pub configuration: Map<String, Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_artifacts: Vec<ArtifactRef>,

    pub name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_artifacts: Vec<ArtifactRef>,

    pub run_order: u32,
}

/// A pipeline stage; stages run in declaration order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stage {
    pub actions: Vec<Action>,
    pub name: String,
}

/// Name of the artifact produced by an action
fn artifact_name(stage: &str, action: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    };
    format!("Artifact_{}_{}", clean(stage), clean(action))
}

fn configuration(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn github_source_action(config: &RepaveConfig, token: &ResolvedSecret) -> Action {
    let source = &config.pipeline.source;
    Action {
        action_type_id: ActionTypeId {
            category: ActionCategory::Source,
            owner: ActionOwner::ThirdParty,
            provider: "GitHub",
            version: "1",
        },
        configuration: configuration(vec![
            ("Owner", json!(source.owner)),
            ("Repo", json!(source.repo)),
            ("Branch", json!(source.branch)),
            ("OAuthToken", json!(token)),
            ("PollForSourceChanges", json!(false)),
        ]),
        input_artifacts: Vec::new(),
        name: SOURCE_ACTION.to_string(),
        output_artifacts: vec![ArtifactRef {
            name: artifact_name(SOURCE_STAGE, SOURCE_ACTION),
        }],
        run_order: 1,
    }
}

fn codebuild_action(project_id: &str, input: &str) -> Action {
    Action {
        action_type_id: ActionTypeId {
            category: ActionCategory::Build,
            owner: ActionOwner::Aws,
            provider: "CodeBuild",
            version: "1",
        },
        configuration: configuration(vec![(
            "ProjectName",
            intrinsics::reference(project_id),
        )]),
        input_artifacts: vec![ArtifactRef {
            name: input.to_string(),
        }],
        name: DEPLOY_ACTION.to_string(),
        output_artifacts: Vec::new(),
        run_order: 1,
    }
}

/// Bucket blocking every form of public access, emptied and deleted with the stack
fn private_bucket(name: Option<&str>) -> Resource {
    let mut bucket = Resource::new(ResourceKind::S3Bucket)
        .property(
            "PublicAccessBlockConfiguration",
            json!({
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true
            }),
        )
        .property("Tags", json!([Tag::new(TAG_AUTO_DELETE_OBJECTS, "true")]))
        .removal_policy(RemovalPolicy::Delete);
    if let Some(name) = name {
        bucket = bucket.property("BucketName", name);
    }
    bucket
}

/// The only statement of the config bucket policy
///
/// Exactly three principals (the build service, the EC2 service and the
/// compute identity) and exactly two actions on the bucket's objects.
pub fn config_bucket_statement(bucket: &str, identity: &ComputeIdentity) -> PolicyStatement {
    PolicyStatement::allow()
        .actions(CONFIG_BUCKET_ACTIONS.iter().copied())
        .resources([json!(format!("arn:aws:s3:::{bucket}/*"))])
        .service_principal(CODEBUILD_SERVICE)
        .service_principal(EC2_SERVICE)
        .arn_principal(identity.arn())
}

pub struct ConfigPipelineStack;

impl ConfigPipelineStack {
    /// Build the pipeline stack for the given compute identity
    pub fn build(
        config: &RepaveConfig,
        identity: &ComputeIdentity,
        secrets: &dyn SecretResolver,
    ) -> SynthResult<Stack> {
        let pipeline_config = &config.pipeline;
        let token = secrets.resolve(&pipeline_config.oauth_secret)?;
        let build_spec = BuildSpec::for_config(config)?.to_json_string()?;

        let mut stack = Stack::new(
            &config.stacks.pipeline,
            "Distributes the CloudWatch agent configuration to the repave fleet",
        );
        stack.add_dependency(identity.stack_name());

        // Config bucket and its policy
        let bucket = pipeline_config.config_bucket.as_str();
        let bucket_id = logical_id(&[bucket]);
        stack.add(&bucket_id, private_bucket(Some(bucket)))?;

        let bucket_policy_id = logical_id(&[bucket, "Policy"]);
        stack.add(
            &bucket_policy_id,
            Resource::new(ResourceKind::S3BucketPolicy)
                .property("Bucket", intrinsics::reference(&bucket_id))
                .property(
                    "PolicyDocument",
                    PolicyDocument::new(vec![config_bucket_statement(bucket, identity)])
                        .to_value()?,
                ),
        )?;
        auto_delete::empty_on_delete(&mut stack, bucket, &bucket_id, Some(&bucket_policy_id))?;

        // Build project
        let execution_policy_id = logical_id(&[EXECUTION_POLICY]);
        stack.add(
            &execution_policy_id,
            Resource::new(ResourceKind::IamManagedPolicy)
                .property("Description", "")
                .property("ManagedPolicyName", EXECUTION_POLICY)
                .property("Path", "/")
                .property(
                    "PolicyDocument",
                    PolicyDocument::new(vec![
                        PolicyStatement::allow()
                            .actions(EXECUTION_ACTIONS.iter().copied())
                            .resources([json!("*")]),
                    ])
                    .to_value()?,
                ),
        )?;

        let execution_role_id = logical_id(&[EXECUTION_ROLE]);
        stack.add(
            &execution_role_id,
            iam::service_role(
                CODEBUILD_SERVICE,
                vec![intrinsics::reference(&execution_policy_id)],
            )?
            .property("RoleName", EXECUTION_ROLE),
        )?;

        let project_id = logical_id(&[PROJECT]);
        stack.add(
            &project_id,
            Resource::new(ResourceKind::CodeBuildProject)
                .property("Artifacts", json!({ "Type": CODEPIPELINE_TYPE }))
                .property("Cache", json!({ "Type": "NO_CACHE" }))
                .property("EncryptionKey", "alias/aws/s3")
                .property(
                    "Environment",
                    json!({
                        "ComputeType": BUILD_COMPUTE_TYPE,
                        "Image": pipeline_config.build_image,
                        "ImagePullCredentialsType": "CODEBUILD",
                        "PrivilegedMode": false,
                        "Type": BUILD_ENVIRONMENT_TYPE
                    }),
                )
                .property(
                    "ServiceRole",
                    intrinsics::get_att(&execution_role_id, "Arn"),
                )
                .property(
                    "Source",
                    json!({ "BuildSpec": build_spec, "Type": CODEPIPELINE_TYPE }),
                ),
        )?;

        // Pipeline
        let artifacts_path = format!("{PIPELINE}/ArtifactsBucket");
        let artifacts_id = logical_id(&[PIPELINE, "ArtifactsBucket"]);
        stack.add(
            &artifacts_id,
            private_bucket(None).property(
                "BucketEncryption",
                json!({
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                    }]
                }),
            ),
        )?;
        auto_delete::empty_on_delete(&mut stack, &artifacts_path, &artifacts_id, None)?;

        let role_path = format!("{PIPELINE}/Role");
        let role_id = logical_id(&[PIPELINE, "Role"]);
        stack.add(&role_id, iam::service_role(CODEPIPELINE_SERVICE, Vec::new())?)?;

        let (role_policy_id, role_policy) = iam::default_policy(
            &role_path,
            &role_id,
            vec![
                PolicyStatement::allow()
                    .actions(ARTIFACT_BUCKET_ACTIONS.iter().copied())
                    .resources(iam::bucket_arns(&artifacts_id)),
                PolicyStatement::allow()
                    .actions(PROJECT_ACTIONS.iter().copied())
                    .resources([intrinsics::get_att(&project_id, "Arn")]),
            ],
        )?;
        stack.add(&role_policy_id, role_policy)?;

        let source_action = github_source_action(config, &token);
        let source_artifact = artifact_name(SOURCE_STAGE, SOURCE_ACTION);
        let stages = vec![
            Stage {
                actions: vec![source_action],
                name: SOURCE_STAGE.to_string(),
            },
            Stage {
                actions: vec![codebuild_action(&project_id, &source_artifact)],
                name: DEPLOY_STAGE.to_string(),
            },
        ];

        let pipeline_id = logical_id(&[PIPELINE]);
        stack.add(
            &pipeline_id,
            Resource::new(ResourceKind::CodePipeline)
                .property(
                    "ArtifactStore",
                    json!({ "Location": intrinsics::reference(&artifacts_id), "Type": "S3" }),
                )
                .property("RoleArn", intrinsics::get_att(&role_id, "Arn"))
                .property("Stages", json!(stages))
                .depends_on(&role_policy_id)
                .depends_on(&role_id),
        )?;

        stack.add(
            &logical_id(&[PIPELINE, SOURCE_STAGE, SOURCE_ACTION, "WebhookResource"]),
            Resource::new(ResourceKind::CodePipelineWebhook)
                .property("Authentication", "GITHUB_HMAC")
                .property(
                    "AuthenticationConfiguration",
                    json!({ "SecretToken": token }),
                )
                .property(
                    "Filters",
                    json!([{
                        "JsonPath": "$.ref",
                        "MatchEquals": "refs/heads/{Branch}"
                    }]),
                )
                .property("RegisterWithThirdParty", true)
                .property("TargetAction", SOURCE_ACTION)
                .property("TargetPipeline", intrinsics::reference(&pipeline_id))
                .property("TargetPipelineVersion", 1),
        )?;

        stack.add_output(
            "ConfigBucketName",
            Output {
                description: Some("Bucket the agent configuration is published to".to_string()),
                value: intrinsics::reference(&bucket_id),
                export: None,
            },
        );
        stack.add_output(
            "PipelineName",
            Output {
                description: None,
                value: intrinsics::reference(&pipeline_id),
                export: None,
            },
        );

        info!(
            stack = %stack.name(),
            bucket = %bucket,
            identity = %identity.export_name(),
            "Built config pipeline"
        );
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthError;
    use crate::secrets::{DynamicReferenceResolver, VerifiedSecrets};
    use crate::stacks::ComputeTargetStack;
    use std::fs;

    fn identity() -> ComputeIdentity {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("user_data.sh");
        fs::write(&script, "#!/bin/bash\n").unwrap();
        ComputeTargetStack::build(&RepaveConfig::default(), &script)
            .unwrap()
            .identity
    }

    fn build() -> (Stack, ComputeIdentity) {
        let identity = identity();
        let stack = ConfigPipelineStack::build(
            &RepaveConfig::default(),
            &identity,
            &DynamicReferenceResolver,
        )
        .unwrap();
        (stack, identity)
    }

    #[test]
    fn test_bucket_policy_principals_and_actions() {
        let (stack, identity) = build();
        let template = stack.template();
        let policies: Vec<_> = template.resources_of(ResourceKind::S3BucketPolicy).collect();
        assert_eq!(policies.len(), 1);

        let statements = &policies[0].1.get("PolicyDocument").unwrap()["Statement"];
        assert_eq!(statements.as_array().unwrap().len(), 1);
        let statement = &statements[0];
        assert_eq!(statement["Action"], json!(["s3:PutObject", "s3:GetObject"]));
        assert_eq!(
            statement["Resource"],
            json!(["arn:aws:s3:::vr-labs-cloudwatch-agent-config/*"])
        );
        assert_eq!(
            statement["Principal"],
            json!({
                "Service": ["codebuild.amazonaws.com", "ec2.amazonaws.com"],
                "AWS": [identity.arn()]
            })
        );
    }

    #[test]
    fn test_statement_counts_three_principals() {
        let statement = config_bucket_statement("bucket", &identity());
        assert_eq!(statement.principal.unwrap().len(), 3);
        assert_eq!(statement.action.len(), 2);
    }

    #[test]
    fn test_config_bucket_is_deleted_and_emptied() {
        let (stack, _) = build();
        let template = stack.template();
        let bucket_id = logical_id(&["vr-labs-cloudwatch-agent-config"]);
        let bucket = template.resource(&bucket_id).unwrap();
        assert_eq!(bucket.deletion_policy, Some(RemovalPolicy::Delete));
        assert_eq!(bucket.update_replace_policy, Some(RemovalPolicy::Delete));
        assert_eq!(
            bucket.get("BucketName"),
            Some(&json!("vr-labs-cloudwatch-agent-config"))
        );

        assert!(
            template
                .resources_of(ResourceKind::AutoDeleteObjects)
                .any(|(_, r)| r.get("BucketName") == Some(&json!({"Ref": bucket_id})))
        );
        assert!(template.teardown_residue().is_empty());
    }

    #[test]
    fn test_emptied_buckets_carry_auto_delete_tag() {
        let (stack, _) = build();
        let buckets: Vec<_> = stack.template().resources_of(ResourceKind::S3Bucket).collect();
        assert_eq!(buckets.len(), 2);
        for (_, bucket) in buckets {
            assert_eq!(
                bucket.get("Tags"),
                Some(&json!([{"Key": TAG_AUTO_DELETE_OBJECTS, "Value": "true"}]))
            );
        }
    }

    #[test]
    fn test_stages_in_order() {
        let (stack, _) = build();
        let template = stack.template();
        let (_, pipeline) = template.resources_of(ResourceKind::CodePipeline).next().unwrap();
        let stages = pipeline.get("Stages").unwrap().as_array().unwrap();
        let names: Vec<_> = stages.iter().map(|s| s["Name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Source", "Deploy_Cloudwatch_Agent_Config"]);

        let source = &stages[0]["Actions"][0];
        let deploy = &stages[1]["Actions"][0];
        assert_eq!(deploy["Name"], "Cloudwatch-Config-Deploy");
        assert_eq!(
            source["OutputArtifacts"][0]["Name"],
            deploy["InputArtifacts"][0]["Name"]
        );
        assert_eq!(source["Configuration"]["PollForSourceChanges"], json!(false));
        assert_eq!(source["Configuration"]["Owner"], "VerticalRelevance");
    }

    #[test]
    fn test_token_is_dynamic_reference() {
        let (stack, _) = build();
        let text = stack.template().to_json_pretty().unwrap();
        assert!(text.contains(
            "{{resolve:secretsmanager:github/personal/mhiggins:SecretString:my-github-token::}}"
        ));
    }

    #[test]
    fn test_build_spec_runs_two_commands() {
        let (stack, _) = build();
        let template = stack.template();
        let (_, project) = template
            .resources_of(ResourceKind::CodeBuildProject)
            .next()
            .unwrap();
        let spec: Value =
            serde_json::from_str(project.get("Source").unwrap()["BuildSpec"].as_str().unwrap())
                .unwrap();
        assert_eq!(spec["version"], "0.2");
        let commands = spec["phases"]["build"]["commands"].as_array().unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            "aws s3 cp config.json s3://vr-labs-cloudwatch-agent-config/"
        );
    }

    #[test]
    fn test_execution_policy_is_broad() {
        let (stack, _) = build();
        let template = stack.template();
        let (_, policy) = template
            .resources_of(ResourceKind::IamManagedPolicy)
            .next()
            .unwrap();
        let statement = &policy.get("PolicyDocument").unwrap()["Statement"][0];
        assert_eq!(statement["Resource"], json!(["*"]));
        assert_eq!(statement["Action"].as_array().unwrap().len(), 15);
    }

    #[test]
    fn test_depends_on_compute_stack() {
        let (stack, identity) = build();
        assert_eq!(stack.dependencies(), &[identity.stack_name().to_string()]);
    }

    #[test]
    fn test_unavailable_secret_fails_build() {
        let err = ConfigPipelineStack::build(
            &RepaveConfig::default(),
            &identity(),
            &VerifiedSecrets::new(Vec::<String>::new()),
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::SecretUnavailable { .. }));
    }
}
