//! Bearer token handling: claim extraction and optional signature verification.

pub mod claims;
pub mod verifier;

use thiserror::Error;

pub use claims::{decode_bearer, decode_claims, extract_bearer, IdentityClaims};
pub use verifier::TokenVerifier;

/// Authentication failures; every variant maps to 401 with its display text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidHeaderFormat,

    #[error("Empty token")]
    EmptyToken,

    #[error("Invalid JWT format")]
    InvalidJwtFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid user ID in token")]
    InvalidUserId,
}
