//! Logical id allocation
//!
//! A logical id is the alphanumeric form of a construct path followed by an
//! 8-character hash of the full path, so ids are stable across runs and two
//! paths that sanitize to the same text still get distinct ids.

use sha2::{Digest, Sha256};

/// CloudFormation limit on logical id length
const MAX_LOGICAL_ID_LEN: usize = 255;

const HASH_LEN: usize = 8;

/// Allocate the logical id for a construct path (e.g. `["VPC", "publicSubnet1", "Subnet"]`)
pub fn logical_id(path: &[&str]) -> String {
    let human: String = path
        .iter()
        .flat_map(|part| part.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    let digest = Sha256::digest(path.join("/").as_bytes());
    let hash = hex::encode_upper(&digest[..HASH_LEN / 2]);

    let max_human = MAX_LOGICAL_ID_LEN - HASH_LEN;
    let human = if human.len() > max_human {
        &human[..max_human]
    } else {
        &human
    };

    format!("{human}{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_is_stable() {
        assert_eq!(logical_id(&["VPC"]), logical_id(&["VPC"]));
    }

    #[test]
    fn test_logical_id_is_alphanumeric() {
        let id = logical_id(&["Cloudwatch Agent Config Deploy", "Role-Policy"]);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "{id}");
        assert!(id.starts_with("CloudwatchAgentConfigDeployRolePolicy"));
        assert_eq!(id.len(), "CloudwatchAgentConfigDeployRolePolicy".len() + HASH_LEN);
    }

    #[test]
    fn test_colliding_text_gets_distinct_ids() {
        // Both sanitize to "ab" but the paths differ
        let a = logical_id(&["a", "b"]);
        let b = logical_id(&["ab"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_paths_are_truncated() {
        let long = "x".repeat(400);
        let id = logical_id(&[&long]);
        assert_eq!(id.len(), MAX_LOGICAL_ID_LEN);
    }
}
