use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use paquet_relay::{build_router, AppState, RelayConfig};
use paquet_store::{MemoryObjectStore, ObjectStore};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Paquet file-transfer relay daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve {
        #[arg(long, default_value = "config/relay.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct RuntimeConfig {
    http: HttpSection,
    storage: StorageSection,
    payment: PaymentSection,
}

#[derive(Debug, Clone, Deserialize)]
struct HttpSection {
    bind: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageSection {
    backend: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentSection {
    secret: String,
    #[serde(default = "default_short_ttl")]
    paid_short_ttl: u64,
    #[serde(default)]
    bypass_plans: Vec<String>,
    #[serde(default)]
    transfer_ttl_secs: u64,
}

fn default_short_ttl() -> u64 {
    86_400
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => serve(config).await,
    }
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let config_source = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config file {}", config_path.display()))?;
    let config: RuntimeConfig = toml::from_str(&config_source)
        .with_context(|| format!("invalid config TOML at {}", config_path.display()))?;

    if config.payment.secret.trim().is_empty() {
        bail!("payment.secret must be set: signed tokens need a shared secret");
    }

    let store: Arc<dyn ObjectStore> = match config.storage.backend.as_str() {
        "memory" => {
            warn!("memory storage backend selected: objects do not survive restarts");
            Arc::new(MemoryObjectStore::new())
        }
        other => bail!("unknown storage backend {other:?} (expected \"memory\")"),
    };

    let relay_config = RelayConfig {
        payment_secret: config.payment.secret.clone(),
        paid_short_ttl: config.payment.paid_short_ttl,
        bypass_plans: config.payment.bypass_plans.clone(),
        transfer_ttl_secs: match config.payment.transfer_ttl_secs {
            0 => None,
            secs => Some(secs),
        },
    };

    let state = AppState::new(store, relay_config);
    let app = build_router(state);

    let socket: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid socket address {}", config.http.bind))?;

    let listener = tokio::net::TcpListener::bind(socket)
        .await
        .with_context(|| format!("failed to bind {}", config.http.bind))?;

    info!(bind = %config.http.bind, "paquetd relay listening");
    axum::serve(listener, app).await.context("axum server failed")
}
