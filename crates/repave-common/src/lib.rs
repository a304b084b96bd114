//! repave-common - Shared configuration and naming for the repave stacks
//!
//! Every value that couples two stacks by string (the environment tag, the
//! command document name, the config bucket) is defined here once so that the
//! compute target, the pipeline and the document cannot drift apart.
//!
//! ## Modules
//!
//! - [`config`]: Typed, validated configuration for a synthesis run
//! - [`defaults`]: Default configuration values
//! - [`error`]: Configuration loading and validation errors
//! - [`resource_kind`]: CloudFormation resource types the stacks declare
//! - [`tags`]: Tag keys and SSM tag-target helpers

pub mod config;
pub mod defaults;
pub mod error;
pub mod resource_kind;
pub mod tags;

pub use config::{
    CommandConfig, ComputeConfig, DocumentConfig, PipelineConfig, RepaveConfig, SecretConfig,
    SourceConfig, StackNames, TagConfig,
};
pub use error::ConfigError;
pub use resource_kind::ResourceKind;
