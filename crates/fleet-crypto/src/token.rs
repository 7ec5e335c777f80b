//! Opaque agent fingerprint tokens.
//!
//! Distinct from JWTs: a 32-byte cryptographically random value, base64url
//! encoded, handed to an agent at registration and presented on agent-side
//! endpoints in the same `Authorization: Bearer` slot a JWT would occupy.

use crate::base64url;
use rand::RngCore;

pub const FINGERPRINT_BYTE_LEN: usize = 32;

/// Generates a new opaque fingerprint token using the OS-backed CSPRNG.
pub fn generate_fingerprint() -> String {
    let mut bytes = [0u8; FINGERPRINT_BYTE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64url::encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_unique_tokens() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let token = generate_fingerprint();
            assert!(seen.insert(token), "fingerprint collision");
        }
    }

    #[test]
    fn decodes_back_to_32_bytes() {
        let token = generate_fingerprint();
        let decoded = base64url::decode(&token).unwrap();
        assert_eq!(decoded.len(), FINGERPRINT_BYTE_LEN);
    }
}
