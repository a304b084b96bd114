//! Default configuration values shared by every stack
//!
//! These constants are the literals the deployed environment was built with.

/// Region the fleet command is sent to
pub const DEFAULT_REGION: &str = "us-east-1";

/// Stack holding the network, instance and instance role
pub const COMPUTE_STACK_NAME: &str = "ec2-instance-cloudwatch-repave";

/// Stack holding the config bucket and the delivery pipeline
pub const PIPELINE_STACK_NAME: &str = "codebuild-pipeline";

/// Stack holding the SSM command document
pub const DOCUMENT_STACK_NAME: &str = "SSMRepaveDocument";

/// Instance size of the repave target
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.nano";

/// Address space of the VPC
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

/// Number of availability zones the public subnet tier spans
pub const DEFAULT_MAX_AZS: u8 = 2;

/// Public SSM parameter resolving to the latest Amazon Linux 2 (HVM, gp2) AMI
pub const DEFAULT_AMI_PARAMETER: &str =
    "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2";

/// Tag key used to select the fleet
pub const DEFAULT_ENVIRONMENT_TAG_KEY: &str = "Environment";

/// Tag value carried by the instance and matched by the send-command targets
pub const DEFAULT_ENVIRONMENT_TAG_VALUE: &str = "CWAgentRepave00";

/// Local bootstrap script uploaded as an asset
pub const DEFAULT_USER_DATA_PATH: &str = "user_data.sh";

/// Bucket receiving the agent configuration
pub const DEFAULT_CONFIG_BUCKET: &str = "vr-labs-cloudwatch-agent-config";

/// Agent configuration file produced by the source repository
pub const DEFAULT_AGENT_CONFIG_FILE: &str = "config.json";

/// GitHub owner of the agent configuration repository
pub const DEFAULT_SOURCE_OWNER: &str = "VerticalRelevance";

/// GitHub repository holding the agent configuration
pub const DEFAULT_SOURCE_REPO: &str = "MonitoringFoundations-Blueprint-agent-config";

/// Branch the pipeline tracks
pub const DEFAULT_SOURCE_BRANCH: &str = "main";

/// Secrets Manager secret holding the GitHub token
pub const DEFAULT_OAUTH_SECRET_ID: &str = "github/personal/mhiggins";

/// JSON field of the secret holding the token
pub const DEFAULT_OAUTH_SECRET_FIELD: &str = "my-github-token";

/// CodeBuild image for the deploy stage (Amazon Linux 2, standard 2.0)
pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:2.0";

/// Name the command document is registered under
pub const DEFAULT_DOCUMENT_NAME: &str = "ssm_document_cloudwatch_agent";

/// Document version the pipeline invokes
pub const DEFAULT_DOCUMENT_VERSION: &str = "1";

/// Local file holding the command document body
pub const DEFAULT_DOCUMENT_PATH: &str = "ssm_document_cloudwatch_agent.yml";

/// Send-command timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: u32 = 600;

/// Send-command maximum concurrency
pub const DEFAULT_MAX_CONCURRENCY: u32 = 50;

/// Send-command tolerated errors
pub const DEFAULT_MAX_ERRORS: u32 = 0;

/// Qualifier of the bootstrapped asset staging bucket
pub const DEFAULT_ASSET_QUALIFIER: &str = "hnb659fds";

/// Configuration file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "repave.json";

/// Cloud assembly output directory
pub const DEFAULT_OUT_DIR: &str = "cdk.out";

// Serde default functions for struct field defaults

pub fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

pub fn default_compute_stack() -> String {
    COMPUTE_STACK_NAME.to_string()
}

pub fn default_pipeline_stack() -> String {
    PIPELINE_STACK_NAME.to_string()
}

pub fn default_document_stack() -> String {
    DOCUMENT_STACK_NAME.to_string()
}

pub fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_string()
}

pub fn default_vpc_cidr() -> String {
    DEFAULT_VPC_CIDR.to_string()
}

pub fn default_max_azs() -> u8 {
    DEFAULT_MAX_AZS
}

pub fn default_ami_parameter() -> String {
    DEFAULT_AMI_PARAMETER.to_string()
}

pub fn default_environment_tag_key() -> String {
    DEFAULT_ENVIRONMENT_TAG_KEY.to_string()
}

pub fn default_environment_tag_value() -> String {
    DEFAULT_ENVIRONMENT_TAG_VALUE.to_string()
}

pub fn default_user_data_path() -> String {
    DEFAULT_USER_DATA_PATH.to_string()
}

pub fn default_config_bucket() -> String {
    DEFAULT_CONFIG_BUCKET.to_string()
}

pub fn default_agent_config_file() -> String {
    DEFAULT_AGENT_CONFIG_FILE.to_string()
}

pub fn default_source_owner() -> String {
    DEFAULT_SOURCE_OWNER.to_string()
}

pub fn default_source_repo() -> String {
    DEFAULT_SOURCE_REPO.to_string()
}

pub fn default_source_branch() -> String {
    DEFAULT_SOURCE_BRANCH.to_string()
}

pub fn default_oauth_secret_id() -> String {
    DEFAULT_OAUTH_SECRET_ID.to_string()
}

pub fn default_oauth_secret_field() -> String {
    DEFAULT_OAUTH_SECRET_FIELD.to_string()
}

pub fn default_build_image() -> String {
    DEFAULT_BUILD_IMAGE.to_string()
}

pub fn default_document_name() -> String {
    DEFAULT_DOCUMENT_NAME.to_string()
}

pub fn default_document_version() -> String {
    DEFAULT_DOCUMENT_VERSION.to_string()
}

pub fn default_document_path() -> String {
    DEFAULT_DOCUMENT_PATH.to_string()
}

pub fn default_command_timeout_seconds() -> u32 {
    DEFAULT_COMMAND_TIMEOUT_SECONDS
}

pub fn default_max_concurrency() -> u32 {
    DEFAULT_MAX_CONCURRENCY
}

pub fn default_max_errors() -> u32 {
    DEFAULT_MAX_ERRORS
}

pub fn default_asset_qualifier() -> String {
    DEFAULT_ASSET_QUALIFIER.to_string()
}
