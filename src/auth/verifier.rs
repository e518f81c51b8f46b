use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{error, warn};

use crate::config::AuthConfig;

use super::claims::{decode_claims, IdentityClaims};
use super::AuthError;

/// Decides how much of a bearer token is trusted before its claims are used
pub enum TokenVerifier {
    /// Claims are read without any signature or expiry check
    DecodeOnly,
    /// HS256 signature and `exp` are validated against the identity provider's secret
    Hs256 { key: DecodingKey, validation: Validation },
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Self {
        match (&config.jwt_secret, config.verify_signatures) {
            (Some(secret), true) => Self::hs256(secret),
            (None, true) => {
                error!("AUTH_VERIFY_SIGNATURES is set but no SUPABASE_JWT_SECRET is configured; tokens are NOT verified");
                Self::DecodeOnly
            }
            _ => {
                warn!("Bearer tokens are decoded without signature verification; set SUPABASE_JWT_SECRET to verify them");
                Self::DecodeOnly
            }
        }
    }

    pub fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // hosted auth issues `aud: authenticated`; audience is not part of our trust decision
        validation.validate_aud = false;
        Self::Hs256 {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        matches!(self, Self::Hs256 { .. })
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        if let Self::Hs256 { key, validation } = self {
            if token.split('.').count() != 3 {
                return Err(AuthError::InvalidJwtFormat);
            }
            decode::<Value>(token, key, validation).map_err(|e| {
                warn!("Token verification failed: {}", e);
                AuthError::InvalidToken
            })?;
        }
        decode_claims(token)
    }
}
