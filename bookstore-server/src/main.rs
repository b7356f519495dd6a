//! Bookstore API Server
//!
//! Catalog, ordering and Monobank checkout for a small bookstore.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use bookstore_core::cache::ListingCache;
use bookstore_core::gateway::{PaymentGateway, PubkeyCache};
use bookstore_core::orders::{OrderService, OrphanSweeper};
use bookstore_core::store::{PgStore, Store};
use bookstore_mono::MonoClient;
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_cache_flush_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Bookstore API - catalog and ordering with Monobank checkout
#[derive(Parser, Debug)]
#[command(name = "bookstore-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./bookstore-config.toml")]
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
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting bookstore-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
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

    // Run migrations if requested
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

    // Assemble the shared parts
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool.clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(MonoClient::new(
        config.mono.api_base.clone(),
        config.mono.token.clone(),
    ));
    let pubkey = Arc::new(PubkeyCache::new());
    let listings = Arc::new(ListingCache::new(Duration::from_secs(
        config.cache.listing_ttl_secs,
    )));
    let orders = Arc::new(OrderService::new(
        store.clone(),
        gateway,
        pubkey.clone(),
        listings.clone(),
        config.mono.webhook_url.to_string(),
    ));

    // Spawn the orphan sweeper that reports invoice-less orders
    let (sweep_shutdown_tx, sweep_shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = OrphanSweeper::new(
        store.clone(),
        Duration::from_secs(config.sweep.interval_secs),
        Duration::from_secs(config.sweep.min_age_secs),
        sweep_shutdown_rx,
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    // Spawn cache flush handler (listens for SIGHUP)
    let shutdown_notify = spawn_cache_flush_handler(listings.clone(), pubkey);

    // Create application state
    let state = AppState::new(store, orders, listings);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal the background tasks to stop
    shutdown_notify.notify_one();
    let _ = sweep_shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
