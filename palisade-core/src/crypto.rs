//! Password hashing and comparison
//!
//! The guard treats password hashing as an opaque, deterministic function of
//! `(password, salt)`. It is modelled as the [`PasswordHasher`] trait so that
//! deployments can plug in whatever scheme their credential store was
//! populated with. [`Sha256PasswordHasher`] is the default and hashes
//! `"{password}:{salt}"` with SHA256.
//!
//! # Security
//!
//! Stored and computed digests are compared in constant time via the `subtle`
//! crate so that the comparison does not leak how many leading bytes matched.

use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Deterministic salted password hashing.
pub trait PasswordHasher: Send + Sync + 'static {
    /// Hash `password` with the account's `salt`.
    fn hash(&self, password: &str, salt: &str) -> String;

    /// Check `password` against a stored hash in constant time.
    fn verify(&self, password: &str, salt: &str, stored_hash: &str) -> bool {
        let computed = self.hash(password, salt);
        constant_time_compare(computed.as_bytes(), stored_hash.as_bytes())
    }
}

/// SHA256 over `"{password}:{salt}"`, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256PasswordHasher;

impl PasswordHasher for Sha256PasswordHasher {
    fn hash(&self, password: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(b":");
        hasher.update(salt.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Generate a random per-account salt.
///
/// 128 bits from the OS RNG, URL-safe base64 without padding.
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure from which recovery is not possible.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Perform constant-time comparison of two byte slices.
///
/// Slices of different length compare unequal immediately; the length of a
/// hex digest is not secret.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hasher_is_deterministic() {
        let hasher = Sha256PasswordHasher;
        assert_eq!(
            hasher.hash("password", "salt"),
            hasher.hash("password", "salt")
        );
    }

    #[test]
    fn test_sha256_hasher_known_vector() {
        // sha256("password:salt")
        let hasher = Sha256PasswordHasher;
        let expected = hex::encode(Sha256::digest(b"password:salt"));
        assert_eq!(hasher.hash("password", "salt"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_salt_changes_hash() {
        let hasher = Sha256PasswordHasher;
        assert_ne!(hasher.hash("password", "a"), hasher.hash("password", "b"));
    }

    #[test]
    fn test_verify() {
        let hasher = Sha256PasswordHasher;
        let stored = hasher.hash("hunter2", "NaCl");

        assert!(hasher.verify("hunter2", "NaCl", &stored));
        assert!(!hasher.verify("hunter3", "NaCl", &stored));
        assert!(!hasher.verify("hunter2", "KCl", &stored));
    }

    #[test]
    fn test_generate_salt_is_random() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
        // 16 bytes -> 22 base64 characters without padding
        assert_eq!(a.len(), 22);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(constant_time_compare(b"", b""));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"short", b"longer_string"));
    }
}
