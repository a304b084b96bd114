//! Resource tag keys and SSM targeting helpers
//!
//! The environment tag is the only link between the instance and the fleet
//! command: the instance carries `Environment=<value>` and the send-command
//! targets select `tag:Environment` with the same value.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `Name` | `<stack>/<construct>` path of the resource |
//! | `Environment` | Fleet label matched by the send-command targets |
//! | `aws-cdk:subnet-name` | Subnet group name (`public`) |
//! | `aws-cdk:subnet-type` | Subnet group type (`Public`) |
//! | `aws-cdk:auto-delete-objects` | Bucket is emptied on stack deletion |

use serde::{Deserialize, Serialize};

/// Tag key for the construct path of a resource
pub const TAG_NAME: &str = "Name";

/// Tag key for the subnet group name
pub const TAG_SUBNET_NAME: &str = "aws-cdk:subnet-name";

/// Tag key for the subnet group type
pub const TAG_SUBNET_TYPE: &str = "aws-cdk:subnet-type";

/// Tag key marking buckets emptied by the auto-delete custom resource
pub const TAG_AUTO_DELETE_OBJECTS: &str = "aws-cdk:auto-delete-objects";

/// Prefix SSM uses for tag-based targets
const SSM_TAG_TARGET_PREFIX: &str = "tag:";

/// A CloudFormation resource tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `Name` tag for a construct inside a stack
    pub fn name(stack: &str, path: &str) -> Self {
        Self::new(TAG_NAME, format!("{stack}/{path}"))
    }
}

/// Build the SSM target key for a tag key (`Environment` -> `tag:Environment`)
pub fn ssm_target_key(tag_key: &str) -> String {
    format!("{SSM_TAG_TARGET_PREFIX}{tag_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_key() {
        assert_eq!(ssm_target_key("Environment"), "tag:Environment");
    }

    #[test]
    fn test_tag_serializes_pascal_case() {
        let tag = Tag::new("Environment", "CWAgentRepave00");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["Key"], "Environment");
        assert_eq!(json["Value"], "CWAgentRepave00");
    }

    #[test]
    fn test_name_tag_uses_construct_path() {
        let tag = Tag::name("ec2-instance-cloudwatch-repave", "VPC");
        assert_eq!(tag.key, TAG_NAME);
        assert_eq!(tag.value, "ec2-instance-cloudwatch-repave/VPC");
    }
}
