//! Deterministic cache keys.

use sha2::{Digest, Sha256};

/// Length of keys produced by [`cache_key`].
pub const KEY_LEN: usize = 32;

/// Hash `parts` into a fixed-length hex key.
///
/// Parts are joined with `:` before hashing and the SHA-256 hex digest is
/// truncated to [`KEY_LEN`] characters.
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join(":").as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(cache_key(&["user", "query"]), cache_key(&["user", "query"]));
        assert_ne!(cache_key(&["user", "query"]), cache_key(&["user", "other"]));
        assert_ne!(cache_key(&["alice", "q"]), cache_key(&["bob", "q"]));
    }

    #[test]
    fn test_key_shape() {
        let key = cache_key(&["u", "q"]);
        assert_eq!(key.len(), KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
