use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::{AuthSession, IdentityError, IdentityProvider, SignUpMetadata};
use crate::store::RecordStore;

use super::subscription_service::SubscriptionService;
use super::TenantService;

const EMAIL_NOT_CONFIRMED: &str =
    "Please confirm your email before signing in. Check your email for a confirmation link.";
const RESEND_NOTICE: &str = "If the account is awaiting confirmation, a new confirmation link has been sent";
const ADMIN_NOTE: &str = "Admin user created. If email confirmation is enabled, confirm the email to activate.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResendNotice {
    pub message: &'static str,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeededAdmin {
    pub user_id: String,
    pub email: String,
    pub role: &'static str,
    pub note: &'static str,
}

/// Sign-in, sign-up and admin seeding against the identity provider
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    tenants: TenantService,
    subscriptions: SubscriptionService,
    seed_token: Option<String>,
}

impl AccountService {
    pub fn new(store: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>, seed_token: Option<String>) -> Self {
        Self {
            identity,
            tenants: TenantService::new(store.clone()),
            subscriptions: SubscriptionService::new(store),
            seed_token,
        }
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, ApiError> {
        match self.identity.sign_in(&req.email, &req.password).await {
            Ok(session) => Ok(session),
            Err(IdentityError::EmailNotConfirmed) => Err(ApiError::bad_request(EMAIL_NOT_CONFIRMED)),
            Err(e) => {
                warn!("Sign-in failed for {}: {}", req.email, e);
                Err(ApiError::unauthorized("Invalid email or password"))
            }
        }
    }

    /// Creates the account, then its doctor row and free subscription.
    /// Local provisioning failures are logged; the account already exists.
    pub async fn signup(&self, req: SignupRequest) -> Result<AuthSession, ApiError> {
        let metadata = SignUpMetadata { name: req.name.clone(), role: "doctor".to_string() };
        let session = self
            .identity
            .sign_up(&req.email, &req.password, metadata)
            .await
            .map_err(|e| {
                warn!("Sign-up failed for {}: {}", req.email, e);
                ApiError::bad_request("Failed to create account")
            })?;

        match session.user_id() {
            Some(user_id) => self.provision(user_id, &req.name, &req.email).await,
            None => warn!("Sign-up for {} returned no account id, skipping doctor profile", req.email),
        }
        Ok(session)
    }

    async fn provision(&self, user_id: Uuid, name: &str, email: &str) {
        let doctor = match self.tenants.create_doctor(user_id, name, email).await {
            Ok(doctor) => doctor,
            Err(e) => {
                warn!("Failed to create doctor profile for {}: {}", user_id, e);
                return;
            }
        };
        info!("Doctor profile created for user: {}", user_id);

        match self.subscriptions.create_free(doctor.id).await {
            Ok(_) => info!("Free subscription created for doctor: {}", doctor.id),
            Err(e) => warn!("Failed to create free subscription for doctor {}: {}", doctor.id, e),
        }
    }

    pub async fn resend_confirmation(&self, req: ResendRequest) -> Result<ResendNotice, ApiError> {
        if req.email.trim().is_empty() {
            return Err(ApiError::bad_request("Email is required"));
        }
        if let Err(e) = self.identity.resend_confirmation(&req.email).await {
            warn!("Resend confirmation for {} failed: {}", req.email, e);
        }
        Ok(ResendNotice { message: RESEND_NOTICE, email: req.email })
    }

    /// Checks the `X-Admin-Seed-Token` header value; an unset token disables seeding
    pub fn authorize_seed(&self, provided: Option<&str>) -> Result<(), ApiError> {
        match (self.seed_token.as_deref(), provided) {
            (Some(expected), Some(given)) if !expected.is_empty() && tokens_match(expected, given) => Ok(()),
            _ => Err(ApiError::forbidden("Forbidden: invalid seed token")),
        }
    }

    pub async fn seed_admin(&self, req: SignupRequest) -> Result<SeededAdmin, ApiError> {
        if req.email.is_empty() || req.password.is_empty() || req.name.is_empty() {
            return Err(ApiError::bad_request("Email, password and name are required"));
        }
        let metadata = SignUpMetadata { name: req.name, role: "admin".to_string() };
        let session = self
            .identity
            .sign_up(&req.email, &req.password, metadata)
            .await
            .map_err(|e| {
                warn!("Admin seed sign-up failed for {}: {}", req.email, e);
                ApiError::bad_request("Failed to create admin user")
            })?;

        info!("Seeded admin account {}", req.email);
        Ok(SeededAdmin {
            user_id: session.user_id().map(|id| id.to_string()).unwrap_or_default(),
            email: req.email,
            role: "admin",
            note: ADMIN_NOTE,
        })
    }
}

/// Constant-time token comparison: both sides are tagged under one key and the tags compared
fn tokens_match(expected: &str, given: &str) -> bool {
    const KEY: &[u8] = b"sisdental-seed-token";
    let tag = |value: &str| {
        Hmac::<Sha256>::new_from_slice(KEY).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    match (tag(expected), tag(given)) {
        (Ok(expected), Ok(given)) => given.verify_slice(&expected.finalize().into_bytes()).is_ok(),
        _ => false,
    }
}
