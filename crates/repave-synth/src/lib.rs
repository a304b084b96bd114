//! repave-synth - CloudFormation synthesizer for the CloudWatch agent repave
//!
//! Builds three stacks from one [`repave_common::RepaveConfig`] and writes
//! them as a cloud assembly:
//!
//! 1. the compute target (VPC, instance role, bootstrap asset, instance),
//! 2. the config-distribution pipeline, whose bucket policy names the compute
//!    target's role,
//! 3. the SSM command document the pipeline sends to the fleet.
//!
//! ## Modules
//!
//! - [`app`]: Ordered stack composition and the synthesis driver
//! - [`assembly`]: Cloud assembly output and manifest
//! - [`stacks`]: The three stack builders
//! - [`template`]: CloudFormation template model and intrinsics
//! - [`aws`]: Asset publishing and secret verification

pub mod app;
pub mod assembly;
pub mod asset;
pub mod aws;
pub mod build_spec;
pub mod document;
pub mod error;
pub mod iam;
pub mod secrets;
pub mod stacks;
pub mod template;
pub mod user_data;

pub use app::{App, SynthInputs, planned_stacks, synthesize};
pub use assembly::{CloudAssembly, Manifest};
pub use document::{DocumentSource, FileDocumentSource, InlineDocumentSource};
pub use error::{SynthError, SynthResult};
pub use secrets::{DynamicReferenceResolver, SecretResolver, VerifiedSecrets};
pub use stacks::{ComputeIdentity, Stack};
