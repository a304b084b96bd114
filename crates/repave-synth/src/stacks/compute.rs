//! Compute target: network, instance role, bootstrap asset and one instance
//!
//! The instance role is the compute identity. Its ARN is exported so the
//! pipeline stack can name it in the config bucket policy without the two
//! stacks sharing anything but the export name.

use super::Stack;
use super::network::{self, Network};
use crate::asset::FileAsset;
use crate::error::{SynthError, SynthResult};
use crate::iam::{self, EC2_SERVICE, managed_policy_arn};
use crate::template::intrinsics::{self, get_azs, select};
use crate::template::{Export, Output, Parameter, Resource, logical_id};
use crate::user_data::LinuxUserData;
use repave_common::tags::Tag;
use repave_common::{RepaveConfig, ResourceKind};
use serde_json::{Value, json};
use std::path::Path;
use tracing::info;

const VPC: &str = "VPC";
const ROLE: &str = "InstanceSSM";
const INSTANCE: &str = "CloudwatchRepaveTarget";
const USER_DATA_ASSET: &str = "UserDataAsset";

/// Output (and export suffix) carrying the role ARN
pub const ROLE_ARN_OUTPUT: &str = "InstanceRoleArn";

const MANAGED_POLICIES: &[&str] = &[
    "AmazonSSMManagedInstanceCore",
    "CloudWatchAgentServerPolicy",
];

const AMI_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

/// The role instances of the compute target run as
///
/// Handed explicitly to every consumer. Its ARN is only valid in other stacks
/// through the export, so [`ComputeIdentity::arn`] is an `Fn::ImportValue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeIdentity {
    stack_name: String,
    role_logical_id: String,
    export_name: String,
}

impl ComputeIdentity {
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn role_logical_id(&self) -> &str {
        &self.role_logical_id
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    /// The role ARN as seen from another stack
    pub fn arn(&self) -> Value {
        intrinsics::import_value(&self.export_name)
    }
}

/// A built compute stack and the identity it exposes
#[derive(Debug, Clone)]
pub struct ComputeTarget {
    pub stack: Stack,
    pub identity: ComputeIdentity,
}

pub struct ComputeTargetStack;

impl ComputeTargetStack {
    /// Build the compute stack, staging the bootstrap script at `user_data_path`
    pub fn build(config: &RepaveConfig, user_data_path: &Path) -> SynthResult<ComputeTarget> {
        let stack_name = config.stacks.compute.as_str();
        let mut stack = Stack::new(
            stack_name,
            "Instance repaved with the CloudWatch agent configuration",
        );

        let network = network::add_public_vpc(&mut stack, VPC, &config.compute)?;

        let ami_parameter = logical_id(&["SsmParameterValue", &config.compute.ami_parameter]);
        stack.template_mut().insert_parameter(
            &ami_parameter,
            Parameter {
                parameter_type: AMI_PARAMETER_TYPE.to_string(),
                default: Some(config.compute.ami_parameter.clone()),
                description: Some("Latest Amazon Linux 2 image".to_string()),
            },
        );

        let role_id = logical_id(&[ROLE, "Role"]);
        stack.add(
            &role_id,
            iam::service_role(
                EC2_SERVICE,
                MANAGED_POLICIES.iter().copied().map(managed_policy_arn).collect(),
            )?,
        )?;

        let asset = FileAsset::stage(USER_DATA_ASSET, user_data_path)?;
        let (policy_id, policy) = iam::default_policy(
            ROLE,
            &role_id,
            vec![asset.read_statement(&config.asset_qualifier)],
        )?;
        stack.add(&policy_id, policy)?;

        let mut user_data = LinuxUserData::new();
        let local_path = user_data.add_s3_download_command(
            FileAsset::bucket_name(&config.asset_qualifier),
            &asset.object_key(),
        )?;
        user_data.add_execute_file_command(&local_path)?;

        let instance_id = add_instance(
            &mut stack,
            config,
            &network,
            &ami_parameter,
            &role_id,
            &policy_id,
            &user_data,
        )?;

        let export_name = format!("{stack_name}:{ROLE_ARN_OUTPUT}");
        stack.add_output(
            ROLE_ARN_OUTPUT,
            Output {
                description: Some("ARN of the role the repave target runs as".to_string()),
                value: intrinsics::get_att(&role_id, "Arn"),
                export: Some(Export {
                    name: export_name.clone(),
                }),
            },
        );
        stack.add_output(
            "InstanceId",
            Output {
                description: None,
                value: intrinsics::reference(&instance_id),
                export: None,
            },
        );

        info!(
            stack = %stack_name,
            asset = %asset.object_key(),
            resources = stack.template().resources().count(),
            "Built compute target"
        );
        stack.add_asset(asset);

        Ok(ComputeTarget {
            stack,
            identity: ComputeIdentity {
                stack_name: stack_name.to_string(),
                role_logical_id: role_id,
                export_name,
            },
        })
    }
}

fn add_instance(
    stack: &mut Stack,
    config: &RepaveConfig,
    network: &Network,
    ami_parameter: &str,
    role_id: &str,
    policy_id: &str,
    user_data: &LinuxUserData,
) -> SynthResult<String> {
    let stack_name = stack.name().to_string();
    let instance_path = format!("{stack_name}/{INSTANCE}");

    let sg_id = logical_id(&[INSTANCE, "InstanceSecurityGroup"]);
    stack.add(
        &sg_id,
        Resource::new(ResourceKind::SecurityGroup)
            .property("GroupDescription", format!("{instance_path}/InstanceSecurityGroup"))
            .property(
                "SecurityGroupEgress",
                json!([{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1"
                }]),
            )
            .property("VpcId", intrinsics::reference(&network.vpc_id))
            .property("Tags", json!([Tag::name(&stack_name, INSTANCE)])),
    )?;

    let profile_id = logical_id(&[INSTANCE, "InstanceProfile"]);
    stack.add(
        &profile_id,
        Resource::new(ResourceKind::IamInstanceProfile)
            .property("Roles", json!([intrinsics::reference(role_id)])),
    )?;

    let subnet_id = network
        .public_subnet_ids
        .first()
        .ok_or_else(|| SynthError::InvalidConfig("VPC has no public subnet".into()))?;

    let tag = config.environment_tag();
    let mut instance = Resource::new(ResourceKind::Instance)
        .property("AvailabilityZone", select(0, get_azs()))
        .property("IamInstanceProfile", intrinsics::reference(&profile_id))
        .property("ImageId", intrinsics::reference(ami_parameter))
        .property("InstanceType", config.compute.instance_type.clone())
        .property(
            "SecurityGroupIds",
            json!([intrinsics::get_att(&sg_id, "GroupId")]),
        )
        .property("SubnetId", intrinsics::reference(subnet_id))
        .property(
            "Tags",
            json!([
                Tag::new(&tag.key, &tag.value),
                Tag::name(&stack_name, INSTANCE),
            ]),
        )
        .property("UserData", user_data.render())
        .depends_on(policy_id)
        .depends_on(role_id);
    for route in &network.route_ids {
        instance = instance.depends_on(route);
    }

    let instance_id = logical_id(&[INSTANCE, "Resource"]);
    stack.add(&instance_id, instance)?;
    Ok(instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn build_with_script() -> ComputeTarget {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("user_data.sh");
        fs::write(&script, "#!/bin/bash\necho repave\n").unwrap();
        ComputeTargetStack::build(&RepaveConfig::default(), &script).unwrap()
    }

    #[test]
    fn test_identity_is_exported_role_arn() {
        let target = build_with_script();
        let identity = &target.identity;
        assert_eq!(identity.export_name(), "ec2-instance-cloudwatch-repave:InstanceRoleArn");
        assert_eq!(
            identity.arn(),
            json!({"Fn::ImportValue": "ec2-instance-cloudwatch-repave:InstanceRoleArn"})
        );

        let output = target.stack.template().output(ROLE_ARN_OUTPUT).unwrap();
        assert_eq!(output.value, intrinsics::get_att(identity.role_logical_id(), "Arn"));
        assert_eq!(output.export.as_ref().unwrap().name, identity.export_name());
    }

    #[test]
    fn test_role_has_both_managed_policies() {
        let target = build_with_script();
        let role = target
            .stack
            .template()
            .resource(target.identity.role_logical_id())
            .unwrap();
        let arns = role.get("ManagedPolicyArns").unwrap().as_array().unwrap();
        assert_eq!(arns.len(), 2);
        let text = serde_json::to_string(arns).unwrap();
        assert!(text.contains("AmazonSSMManagedInstanceCore"));
        assert!(text.contains("CloudWatchAgentServerPolicy"));
    }

    #[test]
    fn test_instance_carries_environment_tag() {
        let target = build_with_script();
        let template = target.stack.template();
        let (_, instance) = template.resources_of(ResourceKind::Instance).next().unwrap();

        assert_eq!(instance.get("InstanceType"), Some(&json!("t3.nano")));
        let tags = instance.get("Tags").unwrap();
        assert_eq!(
            tags,
            &json!([
                {"Key": "Environment", "Value": "CWAgentRepave00"},
                {"Key": "Name", "Value": "ec2-instance-cloudwatch-repave/CloudwatchRepaveTarget"}
            ])
        );
    }

    #[test]
    fn test_user_data_downloads_and_runs_asset() {
        let target = build_with_script();
        let asset = &target.stack.assets()[0];
        let template = target.stack.template();
        let (_, instance) = template.resources_of(ResourceKind::Instance).next().unwrap();

        let user_data = serde_json::to_string(instance.get("UserData").unwrap()).unwrap();
        let key = asset.object_key();
        assert!(key.ends_with(".sh"));
        assert!(user_data.contains(&format!("/{key}' '/tmp/{key}'")));
        assert!(user_data.contains(&format!("chmod +x '/tmp/{key}'")));
    }

    #[test]
    fn test_role_can_read_asset() {
        let target = build_with_script();
        let template = target.stack.template();
        let (_, policy) = template.resources_of(ResourceKind::IamPolicy).next().unwrap();
        assert_eq!(
            policy.get("Roles"),
            Some(&json!([{"Ref": target.identity.role_logical_id()}]))
        );
        let doc = policy.get("PolicyDocument").unwrap();
        assert_eq!(
            doc["Statement"][0]["Action"],
            json!(["s3:GetObject*", "s3:GetBucket*", "s3:List*"])
        );
    }

    #[test]
    fn test_ami_parameter_defaults_to_amazon_linux_2() {
        let target = build_with_script();
        let config = RepaveConfig::default();
        let id = logical_id(&["SsmParameterValue", &config.compute.ami_parameter]);
        let parameter = target.stack.template().parameter(&id).unwrap();
        assert_eq!(
            parameter.default.as_deref(),
            Some("/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2")
        );
    }

    #[test]
    fn test_missing_script_is_asset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ComputeTargetStack::build(&RepaveConfig::default(), &dir.path().join("nope.sh"))
            .unwrap_err();
        assert!(matches!(err, SynthError::AssetNotFound { .. }));
    }

    #[test]
    fn test_nothing_left_on_teardown() {
        let target = build_with_script();
        assert!(target.stack.template().teardown_residue().is_empty());
    }
}
