#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::{redirect::Policy, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use sisdental_api::app::{app, AppState};
use sisdental_api::billing::{
    BillingError, BillingProvider, CheckoutRequest, CheckoutSession, Customer, NewCustomer, PortalSession, Price,
    Product, StripeSubscription,
};
use sisdental_api::config::AppConfig;
use sisdental_api::identity::{AuthSession, IdentityError, IdentityProvider, SignUpMetadata};
use sisdental_api::store::{MemoryStore, Table};

pub const PASSWORD: &str = "secret";

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
    pub billing: Arc<FakeBilling>,
    pub upload_dir: PathBuf,
}

/// A doctor with a bearer token for its account
pub struct Account {
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub token: String,
}

pub async fn spawn() -> Result<TestServer> {
    spawn_with(AppConfig::for_tests()).await
}

/// Starts the real router in-process on a free port, backed by a fresh memory store
pub async fn spawn_with(mut config: AppConfig) -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);
    let upload_dir = std::env::temp_dir().join(format!("sisdental-test-{}-{}", port, Uuid::new_v4()));
    config.server.port = port;
    config.server.base_url = base_url.clone();
    config.server.upload_dir = upload_dir.to_string_lossy().into_owned();

    let store = Arc::new(MemoryStore::new());
    let billing = Arc::new(FakeBilling::default());
    let state = AppState::new(config, store.clone(), Arc::new(FakeIdentity), billing.clone());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await;
    });

    let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
    let server = TestServer { base_url, client, store, billing, upload_dir };
    server.wait_ready(Duration::from_secs(5)).await?;
    Ok(server)
}

impl TestServer {
    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/api/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Seeds a doctor row and returns its account with an unsigned token
    pub async fn account(&self, name: &str) -> Result<Account> {
        let user_id = Uuid::new_v4();
        let email = format!("{}@clinic.test", name.to_lowercase().replace(' ', "."));
        let doctor = self
            .store
            .seed(Table::Doctors, json!({"user_id": user_id, "name": name, "email": email}))
            .await?;
        let doctor_id = Uuid::parse_str(doctor["id"].as_str().context("doctor id")?)?;
        Ok(Account { user_id, doctor_id, token: make_token(&user_id.to_string(), &email) })
    }

    pub async fn get(&self, account: &Account, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(self.url(path)).bearer_auth(&account.token).send().await?)
    }

    pub async fn post(&self, account: &Account, path: &str, body: Value) -> Result<reqwest::Response> {
        Ok(self.client.post(self.url(path)).bearer_auth(&account.token).json(&body).send().await?)
    }

    pub async fn put(&self, account: &Account, path: &str, body: Value) -> Result<reqwest::Response> {
        Ok(self.client.put(self.url(path)).bearer_auth(&account.token).json(&body).send().await?)
    }

    pub async fn delete(&self, account: &Account, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.delete(self.url(path)).bearer_auth(&account.token).send().await?)
    }

    /// Creates a patient through the API and returns its id
    pub async fn create_patient(&self, account: &Account, name: &str, email: &str) -> Result<String> {
        let resp = self
            .post(
                account,
                "/api/patients",
                json!({"name": name, "email": email, "phone": "11999990000", "address": "Rua A, 1"}),
            )
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "patient create returned {}", resp.status());
        let body: Value = resp.json().await?;
        Ok(body["id"].as_str().context("patient id")?.to_string())
    }
}

/// Three-segment token with a JSON payload and a meaningless signature
pub fn make_token(sub: &str, email: &str) -> String {
    token_with_payload(json!({
        "sub": sub,
        "email": email,
        "role": "authenticated",
        "user_metadata": {"role": "doctor"},
    }))
}

pub fn token_with_payload(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.forged-signature", header, payload)
}

/// Accepts password `secret`; `pending@...` is unconfirmed; `taken@...` cannot sign up
pub struct FakeIdentity;

fn session(email: &str) -> AuthSession {
    AuthSession {
        access_token: make_token(&Uuid::new_v4().to_string(), email),
        refresh_token: "refresh-token".into(),
        user: json!({"id": Uuid::new_v4(), "email": email}),
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        if email.starts_with("pending@") {
            return Err(IdentityError::EmailNotConfirmed);
        }
        if password != PASSWORD {
            return Err(IdentityError::Rejected { status: 400, message: "Invalid login credentials".into() });
        }
        Ok(session(email))
    }

    async fn sign_up(&self, email: &str, _password: &str, _metadata: SignUpMetadata) -> Result<AuthSession, IdentityError> {
        if email.starts_with("taken@") {
            return Err(IdentityError::Rejected { status: 422, message: "User already registered".into() });
        }
        Ok(session(email))
    }

    async fn resend_confirmation(&self, _email: &str) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// Billing provider whose subscription and checkout session are set by the test
#[derive(Default)]
pub struct FakeBilling {
    pub subscription: Mutex<Option<Value>>,
    pub session: Mutex<Option<Value>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
}

pub fn pro_price() -> Value {
    json!({
        "id": "price_pro",
        "product": {"id": "prod_pro", "name": "Pro Plan"},
        "unit_amount": 9990,
        "currency": "brl",
        "recurring": {"interval": "month", "trial_period_days": 14},
        "active": true
    })
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, BillingError> {
    serde_json::from_value(value).map_err(|e| BillingError::Malformed(e.to_string()))
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_customer(&self, _customer: NewCustomer) -> Result<Customer, BillingError> {
        Ok(Customer { id: "cus_test".into() })
    }

    async fn retrieve_price(&self, price_id: &str) -> Result<Price, BillingError> {
        if price_id != "price_pro" {
            return Err(BillingError::Api { status: 404, code: "resource_missing".into(), message: "No such price".into() });
        }
        decode(pro_price())
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        self.checkouts.lock().unwrap().push(request);
        decode(json!({"id": "cs_test", "url": "https://checkout.test/cs_test"}))
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> Result<PortalSession, BillingError> {
        Ok(PortalSession { url: format!("https://portal.test/{}", customer_id) })
    }

    async fn retrieve_subscription(&self, _subscription_id: &str) -> Result<StripeSubscription, BillingError> {
        let value = self.subscription.lock().unwrap().clone().ok_or(BillingError::NotConfigured)?;
        decode(value)
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, BillingError> {
        decode(json!({"id": product_id, "name": "Pro Plan", "active": true}))
    }

    async fn retrieve_checkout_session(&self, _session_id: &str) -> Result<CheckoutSession, BillingError> {
        let value = self.session.lock().unwrap().clone().ok_or(BillingError::NotConfigured)?;
        decode(value)
    }

    async fn list_prices(&self) -> Result<Vec<Price>, BillingError> {
        Ok(vec![decode(pro_price())?])
    }

    async fn list_products(&self) -> Result<Vec<Product>, BillingError> {
        Ok(vec![decode(json!({
            "id": "prod_pro", "name": "Pro Plan", "description": "Everything", "default_price": "price_pro", "active": true
        }))?])
    }
}
