//! classify - collection engine service
//!
//! Loads the bootstrap configuration, restores collections and imports,
//! seeds configured collections, and serves the event stream.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classify_common::config::{load_or_default, resolve_config_path};
use classify_common::EventBus;
use classify_engine::{
    AppState, Classify, CollectionEvent, MemoryRepository, Repository, SqliteRepository,
    TypeRegistry,
};

/// Command-line arguments for classify
#[derive(Parser, Debug)]
#[command(name = "classify")]
#[command(about = "Collection engine: stage, enrich and classify imported data")]
#[command(version)]
struct Args {
    /// Bootstrap config file (overrides CLASSIFY_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "CLASSIFY_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides the config file)
    #[arg(short, long, env = "CLASSIFY_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting classify v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let repository: Arc<dyn Repository> = match args.database.or(config.database_path.clone()) {
        Some(path) => {
            info!("Database: {}", path.display());
            Arc::new(
                SqliteRepository::open(&path)
                    .await
                    .context("Failed to open database")?,
            )
        }
        None => {
            warn!("No database configured, collections are kept in memory only");
            Arc::new(MemoryRepository::new())
        }
    };

    let bus: EventBus<CollectionEvent> = EventBus::new();
    if config.engine.event_log {
        let mut events = bus.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!(collection = %event.collection, id = %event.id, "Event {}", event.tag());
            }
        });
    }

    let classify = Arc::new(Classify::new(
        TypeRegistry::with_defaults(),
        bus,
        repository,
        config.engine.clone(),
    ));
    classify
        .restore()
        .await
        .context("Failed to restore collections")?;
    classify
        .seed_collections(&config.collections)
        .await
        .context("Failed to create configured collections")?;

    let app = classify_engine::build_router(AppState::new(Arc::clone(&classify)));

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Event stream: http://{}/stream", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
