//! Member Registration - Entry point.

use anyhow::Context;
use member_registration::{
    api::{create_router_with_cors, AppState},
    config::Config,
    RegistrationService,
};
use registry_store::RegistryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log.level);

    info!("Starting Member Registration service");

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("Shut down cleanly");
}

async fn run(config: Config) -> anyhow::Result<()> {
    // The service must never run against a store whose schema it could not verify.
    let store = RegistryStore::open(&config.database.path, config.database.busy_timeout())
        .with_context(|| format!("Failed to open registry at {:?}", config.database.path))?;
    let store = Arc::new(store);

    info!(members = store.member_count()?, "Registry ready");

    let service = RegistrationService::new(Arc::clone(&store));
    let app = create_router_with_cors(AppState::new(service), config.server.allow_any_origin);

    let addr = SocketAddr::new(
        config
            .server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {}", config.server.listen_addr))?,
        config.server.port,
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router and its state are gone once serve returns.
    match Arc::try_unwrap(store) {
        Ok(store) => store.close().context("Failed to close registry")?,
        Err(_) => warn!("Registry still referenced at shutdown, skipping explicit close"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
