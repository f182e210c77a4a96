//! sigrelay server
//!
//! Receives document-signing webhooks, stores them durably and relays them
//! to each tenant's CRM according to its workflows.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sigrelay_core::actions::ActionExecutor;
use sigrelay_core::config::TenantRegistry;
use sigrelay_core::events::attempt_channel;
use sigrelay_core::framework::DatabaseProcessor;
use sigrelay_core::processors::{EventProcessor, Ingestor, RetryScheduler};
use sigrelay_core::remote::{HttpCrmClient, HttpDocumentClient, HttpNotifier};
use sigrelay_core::store::{EventStore, PgEventStore, PgRuleStore};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// sigrelay - document-signing webhook to CRM relay
#[derive(Parser, Debug)]
#[command(name = "sigrelay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./sigrelay.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting sigrelay-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let processing = loaded_config.processing.clone();
    tracing::info!(
        tenants = loaded_config.tenants.len(),
        "Configuration loaded from {:?}",
        args.config
    );

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Stores
    let processor = DatabaseProcessor::new(db_pool.clone());
    let events: Arc<dyn EventStore> = Arc::new(PgEventStore::new(processor.clone()));
    let rules = Arc::new(PgRuleStore::new(processor));
    let tenants = TenantRegistry::new(loaded_config.tenants);

    // Pipeline
    let executor = ActionExecutor::new(
        Arc::new(HttpCrmClient::new(processing.remote_timeout)),
        Arc::new(HttpDocumentClient::new(processing.remote_timeout)),
        Arc::new(HttpNotifier::new(processing.remote_timeout)),
    );
    let handler = Arc::new(EventProcessor::new(
        Arc::new(tenants.clone()),
        rules,
        executor,
    ));
    let (attempt_tx, attempt_rx) = attempt_channel();
    let ingestor = Ingestor::new(
        events.clone(),
        Arc::new(tenants.clone()),
        attempt_tx.clone(),
        &processing,
    );
    let scheduler = RetryScheduler::new(events.clone(), handler, processing.clone(), attempt_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.clone().run(attempt_rx, shutdown_rx));

    let state = AppState::new(ingestor, scheduler, events);

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(tenants, config_loader, processing);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop background work before the pool goes away
    reload_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
