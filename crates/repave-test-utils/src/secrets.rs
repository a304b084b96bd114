//! Fake secret resolution

use repave_common::SecretConfig;
use repave_synth::error::{SynthError, SynthResult};
use repave_synth::secrets::{ResolvedSecret, SecretResolver};
use std::cell::RefCell;
use std::collections::HashSet;

/// Resolves secrets without AWS and records every request
///
/// Ids passed to [`FakeSecrets::missing`] fail with `SecretUnavailable`.
#[derive(Debug, Default)]
pub struct FakeSecrets {
    missing: HashSet<String>,
    requested: RefCell<Vec<String>>,
}

impl FakeSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver for which `secret_id` does not exist
    pub fn missing(secret_id: &str) -> Self {
        Self {
            missing: HashSet::from([secret_id.to_string()]),
            ..Self::default()
        }
    }

    /// Secret ids requested so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl SecretResolver for FakeSecrets {
    fn resolve(&self, secret: &SecretConfig) -> SynthResult<ResolvedSecret> {
        self.requested.borrow_mut().push(secret.secret_id.clone());
        if self.missing.contains(&secret.secret_id) {
            return Err(SynthError::SecretUnavailable {
                secret_id: secret.secret_id.clone(),
                reason: "no such secret".to_string(),
            });
        }
        Ok(ResolvedSecret::dynamic_reference(secret))
    }
}
