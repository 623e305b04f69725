//! Invitation token utilities.
//!
//! The plaintext token only ever travels inside the activation email. The
//! server persists the SHA-256 digest, hex encoded, and compares digests on
//! activation.
//!
//! # Examples
//!
//! ```
//! use gophersocial_common::crypto::{generate_invitation_token, hash_token};
//!
//! let token = generate_invitation_token();
//! let digest = hash_token(&token);
//!
//! assert_eq!(digest.len(), 64);
//! assert_ne!(digest, token);
//! ```

use sha2::{Digest, Sha256};

/// Generate a fresh opaque invitation token.
#[must_use]
pub fn generate_invitation_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Hex-encoded SHA-256 digest of a plaintext token.
#[must_use]
pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        let token = generate_invitation_token();
        assert_eq!(hash_token(&token), hash_token(&token));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        assert_ne!(generate_invitation_token(), generate_invitation_token());
    }
}
