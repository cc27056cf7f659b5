//! Security utilities for API key generation and hashing.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generates a fresh raw API key. Shown to the caller exactly once;
/// only the hash is stored.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill(&mut bytes);
    format!("sk_{}", hex::encode(bytes))
}

/// Hashes an API key using SHA-256.
pub fn hash_api_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)
}

/// Verifies an API key against a stored hash using constant-time comparison.
pub fn verify_api_key(input: &str, stored_hash: &str) -> bool {
    let input_hash = hash_api_key(input);
    input_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique_and_prefixed() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with("sk_"));
        assert_eq!(a.len(), 3 + 48);
        assert_ne!(a, b);
    }

    #[test]
    fn test_api_key_hashing() {
        let key = "sk_test_abc123";
        let hash = hash_api_key(key);

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key(key));
    }

    #[test]
    fn test_api_key_verification() {
        let key = "sk_test_abc123";
        let hash = hash_api_key(key);

        assert!(verify_api_key(key, &hash));
        assert!(!verify_api_key("wrong_key", &hash));
    }
}
