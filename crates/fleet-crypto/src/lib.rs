//! Cryptographic primitives for the fleet control plane: JWT minting and
//! validation for human/API sessions, opaque fingerprint tokens for agents,
//! and the base64url codec both ride on.

pub mod base64url;
pub mod jwt;
pub mod token;

pub use jwt::{JwtClaims, JwtError, JwtProvider, JwtProviderConfig, NewTokenParams, TokenPair, TokenType};
pub use token::{generate_fingerprint, FINGERPRINT_BYTE_LEN};
