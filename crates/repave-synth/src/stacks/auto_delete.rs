//! Empty buckets before the stack deletes them
//!
//! A non-empty bucket cannot be deleted, so a `Delete` removal policy alone
//! would strand the config bucket. Each emptied bucket gets a
//! `Custom::S3AutoDeleteObjects` resource backed by one provider function per
//! stack. The provider role is granted access through its own identity
//! policy, leaving the bucket policies untouched.

use super::Stack;
use crate::error::SynthResult;
use crate::iam::{self, LAMBDA_SERVICE, PolicyDocument, PolicyStatement, managed_policy_arn};
use crate::template::intrinsics;
use crate::template::{RemovalPolicy, Resource, logical_id};
use repave_common::ResourceKind;
use repave_common::tags::TAG_AUTO_DELETE_OBJECTS;
use serde_json::json;
use tracing::debug;

const PROVIDER: &str = "AutoDeleteObjectsProvider";

const PROVIDER_RUNTIME: &str = "python3.12";

/// Seconds; emptying a large bucket can take a while
const PROVIDER_TIMEOUT: u32 = 900;

const PROVIDER_ACTIONS: &[&str] = &["s3:GetBucket*", "s3:List*", "s3:DeleteObject*"];

/// Handler deleting every object version on stack deletion
///
/// Only buckets tagged `{tag}=true` are emptied; `{tag}` is filled in by
/// [`provider_code`].
const PROVIDER_CODE: &str = r#"import boto3
import cfnresponse
from botocore.exceptions import ClientError

TAG_KEY = "{tag}"

s3 = boto3.client("s3")


def handler(event, context):
    status = cfnresponse.SUCCESS
    try:
        if event["RequestType"] == "Delete":
            bucket = event["ResourceProperties"]["BucketName"]
            if tagged_for_deletion(bucket):
                empty(bucket)
            else:
                print(f"{bucket} is not tagged {TAG_KEY}=true, leaving objects")
    except ClientError as e:
        if e.response["Error"]["Code"] != "NoSuchBucket":
            print(e)
            status = cfnresponse.FAILED
    except Exception as e:
        print(e)
        status = cfnresponse.FAILED
    cfnresponse.send(event, context, status, {})


def tagged_for_deletion(bucket):
    try:
        tags = s3.get_bucket_tagging(Bucket=bucket)["TagSet"]
    except ClientError as e:
        if e.response["Error"]["Code"] == "NoSuchTagSet":
            return False
        raise
    return any(t["Key"] == TAG_KEY and t["Value"] == "true" for t in tags)


def empty(bucket):
    paginator = s3.get_paginator("list_object_versions")
    for page in paginator.paginate(Bucket=bucket):
        entries = page.get("Versions", []) + page.get("DeleteMarkers", [])
        objects = [{"Key": e["Key"], "VersionId": e["VersionId"]} for e in entries]
        if objects:
            s3.delete_objects(Bucket=bucket, Delete={"Objects": objects})
"#;

fn provider_code() -> String {
    PROVIDER_CODE.replace("{tag}", TAG_AUTO_DELETE_OBJECTS)
}

/// Logical ids of the shared provider
struct Provider {
    function_id: String,
    role_id: String,
}

fn ensure_provider(stack: &mut Stack) -> SynthResult<Provider> {
    let provider = Provider {
        function_id: logical_id(&[PROVIDER, "Handler"]),
        role_id: logical_id(&[PROVIDER, "Role"]),
    };
    if stack.template().resource(&provider.function_id).is_some() {
        return Ok(provider);
    }

    stack.add(
        &provider.role_id,
        iam::service_role(
            LAMBDA_SERVICE,
            vec![managed_policy_arn("service-role/AWSLambdaBasicExecutionRole")],
        )?,
    )?;
    stack.add(
        &provider.function_id,
        Resource::new(ResourceKind::LambdaFunction)
            .property("Code", json!({ "ZipFile": provider_code() }))
            .property("Description", "Empties S3 buckets before they are deleted")
            .property("Handler", "index.handler")
            .property("MemorySize", 128)
            .property("Role", intrinsics::get_att(&provider.role_id, "Arn"))
            .property("Runtime", PROVIDER_RUNTIME)
            .property("Timeout", PROVIDER_TIMEOUT)
            .depends_on(&provider.role_id),
    )?;
    debug!(stack = %stack.name(), function = %provider.function_id, "Added auto-delete provider");
    Ok(provider)
}

/// Empty `bucket_id` whenever the stack deletes it
///
/// `path` is the construct path of the bucket. When `bucket_policy_id` is
/// given, the bucket is only emptied after its policy is in place, so the
/// policy outlives the objects during teardown.
pub fn empty_on_delete(
    stack: &mut Stack,
    path: &str,
    bucket_id: &str,
    bucket_policy_id: Option<&str>,
) -> SynthResult<String> {
    let provider = ensure_provider(stack)?;

    let [bucket_arn, objects_arn] = iam::bucket_arns(bucket_id);
    let policy_id = logical_id(&[path, "AutoDeleteObjectsPolicy"]);
    let policy = PolicyDocument::new(vec![
        PolicyStatement::allow()
            .actions(PROVIDER_ACTIONS.iter().copied())
            .resources([bucket_arn, objects_arn]),
    ]);
    stack.add(
        &policy_id,
        Resource::new(ResourceKind::IamPolicy)
            .property("PolicyDocument", policy.to_value()?)
            .property("PolicyName", policy_id.clone())
            .property("Roles", json!([intrinsics::reference(&provider.role_id)])),
    )?;

    let mut resource = Resource::new(ResourceKind::AutoDeleteObjects)
        .property(
            "ServiceToken",
            intrinsics::get_att(&provider.function_id, "Arn"),
        )
        .property("BucketName", intrinsics::reference(bucket_id))
        .removal_policy(RemovalPolicy::Delete)
        .depends_on(&policy_id);
    if let Some(bucket_policy_id) = bucket_policy_id {
        resource = resource.depends_on(bucket_policy_id);
    }

    let id = logical_id(&[path, "AutoDeleteObjectsCustomResource"]);
    stack.add(&id, resource)?;
    Ok(id)
}
