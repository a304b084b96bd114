//! Secret resolution
//!
//! Secrets never enter the synthesized templates as plaintext. A resolver
//! turns a [`SecretConfig`] into a Secrets Manager dynamic reference that
//! CloudFormation resolves at deploy time. Resolvers are injected so tests
//! can substitute fakes and the CLI can insist that a secret exists.

use crate::error::{SynthError, SynthResult};
use repave_common::SecretConfig;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// A resolved secret as it appears in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret(String);

impl ResolvedSecret {
    /// `{{resolve:secretsmanager:<id>:SecretString:<field>::}}`
    pub fn dynamic_reference(secret: &SecretConfig) -> Self {
        Self(format!(
            "{{{{resolve:secretsmanager:{}:SecretString:{}::}}}}",
            secret.secret_id, secret.json_field
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for ResolvedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<ResolvedSecret> for serde_json::Value {
    fn from(secret: ResolvedSecret) -> Self {
        serde_json::Value::String(secret.0)
    }
}

/// Turns secret references into template values
pub trait SecretResolver {
    fn resolve(&self, secret: &SecretConfig) -> SynthResult<ResolvedSecret>;
}

/// Emits dynamic references without contacting AWS
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicReferenceResolver;

impl SecretResolver for DynamicReferenceResolver {
    fn resolve(&self, secret: &SecretConfig) -> SynthResult<ResolvedSecret> {
        Ok(ResolvedSecret::dynamic_reference(secret))
    }
}

/// Resolves only secrets known to exist
///
/// Built from the ids confirmed by Secrets Manager (see
/// [`crate::aws::secrets::SecretsClient::verify_all`]); any other id fails.
#[derive(Debug, Clone, Default)]
pub struct VerifiedSecrets {
    verified: HashSet<String>,
}

impl VerifiedSecrets {
    pub fn new<I, S>(secret_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            verified: secret_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, secret_id: &str) -> bool {
        self.verified.contains(secret_id)
    }
}

impl SecretResolver for VerifiedSecrets {
    fn resolve(&self, secret: &SecretConfig) -> SynthResult<ResolvedSecret> {
        if !self.contains(&secret.secret_id) {
            return Err(SynthError::SecretUnavailable {
                secret_id: secret.secret_id.clone(),
                reason: "not verified with Secrets Manager".to_string(),
            });
        }
        Ok(ResolvedSecret::dynamic_reference(secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_reference_format() {
        let secret = SecretConfig::default();
        let resolved = DynamicReferenceResolver.resolve(&secret).unwrap();
        assert_eq!(
            resolved.as_str(),
            "{{resolve:secretsmanager:github/personal/mhiggins:SecretString:my-github-token::}}"
        );
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let resolved = ResolvedSecret::dynamic_reference(&SecretConfig::default());
        let json = serde_json::to_value(&resolved).unwrap();
        assert!(json.is_string());
        assert!(json.as_str().unwrap().starts_with("{{resolve:secretsmanager:"));
    }

    #[test]
    fn test_verified_secrets_rejects_unknown() {
        let resolver = VerifiedSecrets::new(["some/other/secret"]);
        let err = resolver.resolve(&SecretConfig::default()).unwrap_err();
        assert!(matches!(err, SynthError::SecretUnavailable { .. }));
        assert!(err.to_string().contains("github/personal/mhiggins"));
    }

    #[test]
    fn test_verified_secrets_resolves_known() {
        let resolver = VerifiedSecrets::new(["github/personal/mhiggins"]);
        assert!(resolver.resolve(&SecretConfig::default()).is_ok());
    }
}
