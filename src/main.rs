use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sisdental_api::app::{app, AppState};
use sisdental_api::billing::StripeClient;
use sisdental_api::config::{AppConfig, StoreBackend};
use sisdental_api::database::{DatabaseManager, PgStore};
use sisdental_api::identity::GoTrueClient;
use sisdental_api::store::{MemoryStore, RecordStore, RestStore};

#[derive(Parser)]
#[command(name = "sisdental-api")]
#[command(about = "Dental clinic practice-management API")]
#[command(version)]
struct Args {
    #[arg(long, help = "Listen port (overrides PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Print the resolved configuration and exit")]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up SUPABASE_URL, STRIPE_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sisdental_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if args.check_config {
        println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
        return Ok(());
    }

    info!("Starting sisdental-api in {:?} mode", config.environment);

    let store = connect_store(&config).await?;
    let identity = GoTrueClient::new(&config.store).context("identity provider configuration")?;
    let billing = StripeClient::new(&config.billing).context("billing client")?;
    if config.billing.secret_key.is_empty() {
        warn!("STRIPE_SECRET_KEY not set; billing endpoints will fail");
    }

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = AppState::new(config, store, Arc::new(identity), Arc::new(billing));
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("sisdental-api listening on http://{}", bind_addr);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.store.backend {
        StoreBackend::Rest => Arc::new(RestStore::new(&config.store).context("record store configuration")?),
        StoreBackend::Postgres => {
            let db = DatabaseManager::connect(&config.store)
                .await
                .context("connecting to DATABASE_URL")?;
            Arc::new(PgStore::new(db))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory record store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    info!("Record store backend: {}", store.backend_name());
    Ok(store)
}

/// Configuration with secrets masked, for `--check-config`
fn redacted(config: &AppConfig) -> AppConfig {
    fn mask(value: &str) -> String {
        if value.is_empty() { String::new() } else { "***".to_string() }
    }

    let mut config = config.clone();
    config.store.anon_key = mask(&config.store.anon_key);
    config.store.service_key = mask(&config.store.service_key);
    config.store.database_url = config.store.database_url.as_deref().map(mask);
    config.auth.jwt_secret = config.auth.jwt_secret.as_deref().map(mask);
    config.auth.admin_seed_token = config.auth.admin_seed_token.as_deref().map(mask);
    config.billing.secret_key = mask(&config.billing.secret_key);
    config.billing.webhook_secret = config.billing.webhook_secret.as_deref().map(mask);
    config
}
