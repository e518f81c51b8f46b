use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::StoreConfig;

use super::{AuthSession, IdentityError, IdentityProvider, SignUpMetadata};

/// GoTrue error bodies come in two generations of field names
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GoTrueError {
    fn code(&self) -> &str {
        self.error_code.as_deref().or(self.error.as_deref()).unwrap_or_default()
    }

    fn text(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| self.code().to_string())
    }
}

/// Client for the hosted auth service that sits next to the record store
pub struct GoTrueClient {
    client: Client,
    auth_url: String,
    anon_key: String,
}

impl GoTrueClient {
    pub fn new(config: &StoreConfig) -> Result<Self, IdentityError> {
        if config.url.is_empty() {
            return Err(IdentityError::NotConfigured("SUPABASE_URL"));
        }
        if config.anon_key.is_empty() {
            return Err(IdentityError::NotConfigured("SUPABASE_ANON_KEY"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            auth_url: format!("{}/auth/v1", config.url.trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, IdentityError> {
        let response = self
            .client
            .post(format!("{}{}", self.auth_url, path))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read(response: Response) -> Result<Value, IdentityError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| IdentityError::Malformed(e.to_string()));
        }

        let body: GoTrueError = serde_json::from_str(&text).unwrap_or_default();
        debug!("Identity provider answered {}: {}", status, text);
        if body.code() == "email_not_confirmed" {
            return Err(IdentityError::EmailNotConfirmed);
        }
        if status.is_server_error() {
            return Err(IdentityError::Transport(format!("{}: {}", status, body.text())));
        }
        Err(IdentityError::Rejected {
            status: status.as_u16(),
            message: body.text(),
        })
    }
}

/// Sign-up answers with a session when confirmation is off and with the bare user otherwise
fn session_from(body: Value) -> Result<AuthSession, IdentityError> {
    let token = |key: &str| body.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let access_token = token("access_token");
    let refresh_token = token("refresh_token");

    let user = match body.get("user") {
        Some(user) if !user.is_null() => user.clone(),
        _ if body.get("id").is_some() => body.clone(),
        _ => return Err(IdentityError::Malformed("response carries no user".to_string())),
    };

    Ok(AuthSession { access_token, refresh_token, user })
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let body = self
            .post("/token?grant_type=password", json!({ "email": email, "password": password }))
            .await?;
        session_from(body)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: SignUpMetadata) -> Result<AuthSession, IdentityError> {
        let body = self
            .post("/signup", json!({ "email": email, "password": password, "data": metadata }))
            .await?;
        let session = session_from(body)?;
        if session.access_token.is_empty() {
            warn!("Account {} created pending email confirmation", email);
        }
        Ok(session)
    }

    async fn resend_confirmation(&self, email: &str) -> Result<(), IdentityError> {
        self.post("/resend", json!({ "type": "signup", "email": email })).await?;
        Ok(())
    }
}
