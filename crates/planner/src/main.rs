//! Planner server entry-point: loads config, connects the entity store, serves the API.

use anyhow::Context;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use planner::config::{PlannerConfig, StoreBackend};
use planner::coordinator::CoordinatorConfig;
use planner::server::{create_router, PlannerState};
use planner::store::{Credential, HttpEntityStore, HttpStoreConfig, SharedStore, SqliteEntityStore};

#[derive(Debug, Parser)]
#[command(name = "planner-server", version, about = "Scheduling and availability API")]
struct Args {
    /// JSON config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => PlannerConfig::load_from_file(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let store = build_store(&config)?;
    let state = Arc::new(PlannerState::new(
        store,
        CoordinatorConfig::from(&config.coordinator),
    ));
    let app = create_router(state);

    let address = format!("{}:{}", config.server.address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %address, "Planner server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn build_store(config: &PlannerConfig) -> anyhow::Result<SharedStore> {
    match &config.store {
        StoreBackend::Http(settings) => {
            let token = env::var(&config.credential_env).with_context(|| {
                format!(
                    "bearer token missing: set the {} environment variable",
                    config.credential_env
                )
            })?;
            let credential = Credential::bearer(token);
            let http = HttpStoreConfig::from(settings);
            info!(
                base_url = %http.base_url,
                credential = %credential.fingerprint(),
                "Using HTTP entity store"
            );
            Ok(Arc::new(HttpEntityStore::new(http, credential)?))
        }
        StoreBackend::Sqlite { path } => {
            info!(path = %path.display(), "Using SQLite entity store");
            Ok(Arc::new(SqliteEntityStore::open(path)?))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
