//! Shared test utilities for the repave crates
//!
//! - [`aws`]: Region detection and unique run ids for AWS integration tests
//! - [`fixtures`]: Temporary project directories with a bootstrap script and
//!   a command document
//! - [`secrets`]: A recording fake secret resolver

pub mod aws;
pub mod fixtures;
pub mod secrets;

pub use fixtures::{Fixture, VALID_DOCUMENT, read_template, test_config};
pub use secrets::FakeSecrets;
