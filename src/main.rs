//! Pesa Wallet - M-Pesa wallet service
//!
//! ```text
//! ┌──────────┐  STK push / B2C   ┌──────────┐
//! │ Gateway  │──────────────────▶│  M-Pesa  │
//! │  (HTTP)  │◀──────────────────│ (Daraja) │
//! └────┬─────┘     callbacks     └──────────┘
//!      │ atomic units
//! ┌────▼─────┐    ┌──────────┐
//! │  Store   │───▶│  Events  │ (post-commit, best effort)
//! │ (PG/mem) │    │ log/hook │
//! └──────────┘    └──────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pesa_wallet::config::AppConfig;
use pesa_wallet::db::Database;
use pesa_wallet::events::{EventBus, EventSink, LogSink, WebhookSink};
use pesa_wallet::gateway::{self, state::AppState};
use pesa_wallet::mpesa::{MpesaClient, PaymentProvider};
use pesa_wallet::store::{MemoryStore, PgStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn build_sinks(config: &AppConfig) -> anyhow::Result<Vec<Arc<dyn EventSink>>> {
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogSink)];
    if let Some(url) = &config.events.webhook_url {
        let sink = WebhookSink::new(
            url.clone(),
            Duration::from_secs(config.events.webhook_timeout_secs),
        )
        .context("Failed to build event webhook sink")?;
        tracing::info!(url = %url, "Event webhook sink enabled");
        sinks.push(Arc::new(sink));
    }
    Ok(sinks)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = pesa_wallet::logging::init_logging(&config);

    tracing::info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        "Starting Pesa Wallet"
    );

    let provider: Arc<dyn PaymentProvider> = Arc::new(
        MpesaClient::new(config.mpesa.clone()).context("Failed to build M-Pesa client")?,
    );
    let (events, _dispatcher) = EventBus::start(config.events.channel_capacity, build_sinks(&config)?);

    let state = match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.init_schema()
                .await
                .context("Failed to initialize schema")?;
            db.health_check()
                .await
                .context("PostgreSQL health check failed")?;
            let store = Arc::new(PgStore::new(db.pool().clone()));
            AppState::new(store, provider, events, &config.limits, &config.gateway)
        }
        None => {
            tracing::warn!("postgres_url not set; using the in-memory store (balances are lost on restart)");
            let store = Arc::new(MemoryStore::new());
            AppState::new(store, provider, events, &config.limits, &config.gateway)
        }
    };

    gateway::run_server(&config.gateway.host, config.gateway.port, Arc::new(state)).await
}
