//! Hosted identity provider seam: password sign-in, sign-up and confirmation mail.

pub mod gotrue;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use gotrue::GoTrueClient;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider refused the request (bad credentials, duplicate account...)
    #[error("identity provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("email not confirmed")]
    EmailNotConfirmed,

    #[error("identity provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("identity provider unreachable: {0}")]
    Transport(String),

    #[error("unexpected identity provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Transport(err.to_string())
    }
}

/// Tokens and account returned by sign-in / sign-up
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Value,
}

impl AuthSession {
    /// Account id from the provider's user object
    pub fn user_id(&self) -> Option<Uuid> {
        self.user.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Metadata stored on a new account
#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata {
    pub name: String,
    pub role: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_up(&self, email: &str, password: &str, metadata: SignUpMetadata) -> Result<AuthSession, IdentityError>;

    async fn resend_confirmation(&self, email: &str) -> Result<(), IdentityError>;
}
