//! CloudFormation intrinsic functions and pseudo parameters

use serde_json::{Value, json};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const PARTITION: &str = "AWS::Partition";
pub const REGION: &str = "AWS::Region";

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": template}`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `{"Fn::Join": [delimiter, parts]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::ImportValue": export_name}`
pub fn import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

/// `{"Fn::Base64": value}`
pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// `{"Fn::GetAZs": ""}` (zones of the deployment region)
pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

/// `{"Fn::Select": [index, list]}`
pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index, list] })
}

/// `arn:<partition>:<rest>` built with the partition pseudo parameter
pub fn partition_arn(rest: &str) -> Value {
    join("", vec![json!("arn:"), reference(PARTITION), json!(format!(":{rest}"))])
}

/// The logical id a `{"Ref": id}` value points at
pub fn referenced_id(value: &Value) -> Option<&str> {
    value.as_object()?.get("Ref")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_shape() {
        assert_eq!(reference("VPC"), json!({"Ref": "VPC"}));
        assert_eq!(referenced_id(&reference("VPC")), Some("VPC"));
    }

    #[test]
    fn test_referenced_id_ignores_other_shapes() {
        assert!(referenced_id(&json!("VPC")).is_none());
        assert!(referenced_id(&get_att("Role", "Arn")).is_none());
        assert!(referenced_id(&json!({"Ref": 3})).is_none());
    }

    #[test]
    fn test_get_att_shape() {
        assert_eq!(
            get_att("InstanceSSM", "Arn"),
            json!({"Fn::GetAtt": ["InstanceSSM", "Arn"]})
        );
    }

    #[test]
    fn test_select_from_azs() {
        assert_eq!(
            select(1, get_azs()),
            json!({"Fn::Select": [1, {"Fn::GetAZs": ""}]})
        );
    }

    #[test]
    fn test_partition_arn() {
        assert_eq!(
            partition_arn("iam::aws:policy/CloudWatchAgentServerPolicy"),
            json!({"Fn::Join": ["", [
                "arn:",
                {"Ref": "AWS::Partition"},
                ":iam::aws:policy/CloudWatchAgentServerPolicy"
            ]]})
        );
    }
}
