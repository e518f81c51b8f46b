use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub billing: BillingConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub base_url: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StoreBackend {
    /// PostgREST endpoint of the hosted database
    Rest,
    /// Direct Postgres connection
    Postgres,
    /// Process-local tables, lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub anon_key: String,
    pub service_key: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub verify_signatures: bool,
    pub admin_seed_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub api_version: String,
    pub webhook_tolerance_secs: i64,
    pub request_timeout_secs: u64,
}

/// Which patient sub-resources require a patient-doctor assignment before access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub gate_treatments: bool,
    pub gate_documents: bool,
    pub gate_images: bool,
    pub gate_tooth_states: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            gate_treatments: true,
            gate_documents: true,
            gate_images: true,
            gate_tooth_states: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("BASE_URL") {
            self.server.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("FRONTEND_URL") {
            self.server.frontend_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("UPLOAD_DIR") {
            self.server.upload_dir = v;
        }
        if let Ok(v) = env::var("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = v.parse().unwrap_or(self.server.max_upload_bytes);
        }

        // Store overrides
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.store.url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("SUPABASE_ANON_KEY") {
            self.store.anon_key = v;
        }
        if let Ok(v) = env::var("SUPABASE_SERVICE_KEY") {
            self.store.service_key = v;
        }
        if self.store.service_key.is_empty() && !self.store.anon_key.is_empty() {
            tracing::warn!("SUPABASE_SERVICE_KEY not set, falling back to the anon key");
            self.store.service_key = self.store.anon_key.clone();
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.is_empty() {
                self.store.database_url = Some(v);
                self.store.backend = StoreBackend::Postgres;
            }
        }
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "pg" => StoreBackend::Postgres,
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Rest,
            };
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("STORE_REQUEST_TIMEOUT_SECS") {
            self.store.request_timeout_secs = v.parse().unwrap_or(self.store.request_timeout_secs);
        }

        // Auth overrides
        if let Ok(v) = env::var("SUPABASE_JWT_SECRET") {
            if !v.is_empty() {
                self.auth.jwt_secret = Some(v);
                self.auth.verify_signatures = true;
            }
        }
        if let Ok(v) = env::var("AUTH_VERIFY_SIGNATURES") {
            self.auth.verify_signatures = v.parse().unwrap_or(self.auth.verify_signatures);
        }
        if let Ok(v) = env::var("ADMIN_SEED_TOKEN") {
            self.auth.admin_seed_token = Some(v).filter(|s| !s.is_empty());
        }

        // Billing overrides
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.billing.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.billing.webhook_secret = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("STRIPE_API_VERSION") {
            self.billing.api_version = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            self.billing.webhook_tolerance_secs = v.parse().unwrap_or(self.billing.webhook_tolerance_secs);
        }

        // Access gate overrides
        if let Ok(v) = env::var("ACCESS_GATE_TREATMENTS") {
            self.access.gate_treatments = v.parse().unwrap_or(self.access.gate_treatments);
        }
        if let Ok(v) = env::var("ACCESS_GATE_DOCUMENTS") {
            self.access.gate_documents = v.parse().unwrap_or(self.access.gate_documents);
        }
        if let Ok(v) = env::var("ACCESS_GATE_IMAGES") {
            self.access.gate_images = v.parse().unwrap_or(self.access.gate_images);
        }
        if let Ok(v) = env::var("ACCESS_GATE_TOOTH_STATES") {
            self.access.gate_tooth_states = v.parse().unwrap_or(self.access.gate_tooth_states);
        }

        self
    }

    /// Settings used by the test harness: memory store, fixed secrets, every gate on
    pub fn for_tests() -> Self {
        let mut config = Self::development();
        config.store.backend = StoreBackend::Memory;
        config.auth.admin_seed_token = Some("seed-token".to_string());
        config.billing.webhook_secret = Some("whsec_test".to_string());
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
                frontend_url: "http://localhost:5173".to_string(),
                cors_origins: vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:3000".to_string(),
                    "https://sisdental.netlify.app".to_string(),
                ],
                upload_dir: "uploads".to_string(),
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
            },
            store: StoreConfig {
                backend: StoreBackend::Rest,
                url: String::new(),
                anon_key: String::new(),
                service_key: String::new(),
                database_url: None,
                max_connections: 10,
                request_timeout_secs: 30,
            },
            auth: AuthConfig {
                jwt_secret: None,
                verify_signatures: false,
                admin_seed_token: None,
            },
            billing: BillingConfig {
                secret_key: String::new(),
                webhook_secret: None,
                api_version: "2023-10-16".to_string(),
                webhook_tolerance_secs: 300,
                request_timeout_secs: 30,
            },
            access: AccessConfig::default(),
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.store.max_connections = 20;
        config.store.request_timeout_secs = 15;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.cors_origins = vec!["https://sisdental.netlify.app".to_string()];
        config.server.frontend_url = "https://sisdental.netlify.app".to_string();
        config.store.max_connections = 50;
        config.store.request_timeout_secs = 10;
        config.billing.request_timeout_secs = 15;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.frontend_url, "http://localhost:5173");
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.server.cors_origins.contains(&"https://sisdental.netlify.app".to_string()));
        assert!(!config.auth.verify_signatures);
        assert!(config.access.gate_treatments && config.access.gate_tooth_states);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.is_production());
        assert_eq!(config.store.max_connections, 50);
        assert_eq!(config.server.cors_origins, vec!["https://sisdental.netlify.app".to_string()]);
    }

    #[test]
    fn test_config_for_tests_uses_memory_store() {
        let config = AppConfig::for_tests();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.auth.admin_seed_token.as_deref(), Some("seed-token"));
    }
}
