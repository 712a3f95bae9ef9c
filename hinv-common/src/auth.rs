//! Password hashing for stored user accounts
//!
//! Passwords are stored as `SHA-256(salt || password)` in lowercase hex
//! together with a random 128-bit salt, also hex encoded.
//!
//! A single SHA-256 round is fast. The salt defeats precomputed tables but
//! a stolen database still allows offline guessing at hardware speed, so the
//! store file and its backups must be protected like the passwords themselves.
//! Accounts are meant for a trusted home network.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a random salt (32 hex characters)
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// Hash a password with the given salt
///
/// # Examples
///
/// ```
/// use hinv_common::auth::hash_password;
///
/// let hash = hash_password("secret", "00ff");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_password("secret", "00ff"));
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a password against a stored salt and hash
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let calculated = hash_password(password, salt);
    // Length is fixed (64); compare every byte regardless of early mismatch
    calculated.len() == expected_hash.len()
        && calculated
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_random_hex() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_matching_password() {
        let salt = generate_salt();
        let hash = hash_password("admin123", &salt);
        assert!(verify_password("admin123", &salt, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password_or_salt() {
        let salt = generate_salt();
        let hash = hash_password("admin123", &salt);
        assert!(!verify_password("admin124", &salt, &hash));
        assert!(!verify_password("admin123", &generate_salt(), &hash));
        assert!(!verify_password("admin123", &salt, ""));
    }
}
