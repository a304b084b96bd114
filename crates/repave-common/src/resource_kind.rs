//! CloudFormation resource types declared by the repave stacks
//!
//! Keeps the type strings in one place and records which resources hold data
//! that survives a plain delete (a non-empty bucket blocks stack teardown).

use serde::{Serialize, Serializer};

/// Types of CloudFormation resources the stacks declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Vpc,
    Subnet,
    RouteTable,
    SubnetRouteTableAssociation,
    Route,
    InternetGateway,
    VpcGatewayAttachment,
    SecurityGroup,
    Instance,
    IamRole,
    IamPolicy,
    IamManagedPolicy,
    IamInstanceProfile,
    S3Bucket,
    S3BucketPolicy,
    LambdaFunction,
    /// Custom resource that empties a bucket before it is deleted
    AutoDeleteObjects,
    CodeBuildProject,
    CodePipeline,
    CodePipelineWebhook,
    SsmDocument,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::RouteTable,
        ResourceKind::SubnetRouteTableAssociation,
        ResourceKind::Route,
        ResourceKind::InternetGateway,
        ResourceKind::VpcGatewayAttachment,
        ResourceKind::SecurityGroup,
        ResourceKind::Instance,
        ResourceKind::IamRole,
        ResourceKind::IamPolicy,
        ResourceKind::IamManagedPolicy,
        ResourceKind::IamInstanceProfile,
        ResourceKind::S3Bucket,
        ResourceKind::S3BucketPolicy,
        ResourceKind::LambdaFunction,
        ResourceKind::AutoDeleteObjects,
        ResourceKind::CodeBuildProject,
        ResourceKind::CodePipeline,
        ResourceKind::CodePipelineWebhook,
        ResourceKind::SsmDocument,
    ];

    /// CloudFormation `Type` string
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::Instance => "AWS::EC2::Instance",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::IamPolicy => "AWS::IAM::Policy",
            ResourceKind::IamManagedPolicy => "AWS::IAM::ManagedPolicy",
            ResourceKind::IamInstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::S3Bucket => "AWS::S3::Bucket",
            ResourceKind::S3BucketPolicy => "AWS::S3::BucketPolicy",
            ResourceKind::LambdaFunction => "AWS::Lambda::Function",
            ResourceKind::AutoDeleteObjects => "Custom::S3AutoDeleteObjects",
            ResourceKind::CodeBuildProject => "AWS::CodeBuild::Project",
            ResourceKind::CodePipeline => "AWS::CodePipeline::Pipeline",
            ResourceKind::CodePipelineWebhook => "AWS::CodePipeline::Webhook",
            ResourceKind::SsmDocument => "AWS::SSM::Document",
        }
    }

    /// Look up a kind by its CloudFormation `Type` string
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_name() == type_name)
    }

    /// Whether the resource can hold objects that block its deletion
    ///
    /// CloudFormation refuses to delete a bucket that still has objects, so a
    /// bucket is only torn down cleanly when something empties it first.
    pub fn holds_data(self) -> bool {
        matches!(self, ResourceKind::S3Bucket)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_lookup_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_type_name(kind.type_name()), Some(*kind));
        }
    }

    #[test]
    fn test_unknown_type_name() {
        assert!(ResourceKind::from_type_name("AWS::RDS::DBInstance").is_none());
    }

    #[test]
    fn test_only_buckets_hold_data() {
        let holding: Vec<_> = ResourceKind::ALL
            .iter()
            .filter(|kind| kind.holds_data())
            .collect();
        assert_eq!(holding, vec![&ResourceKind::S3Bucket]);
    }

    #[test]
    fn test_serializes_as_type_string() {
        let json = serde_json::to_string(&ResourceKind::AutoDeleteObjects).unwrap();
        assert_eq!(json, "\"Custom::S3AutoDeleteObjects\"");
    }
}
