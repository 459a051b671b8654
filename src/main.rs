//! # Directory Server Binary
//!
//! ```bash
//! cargo run -- --config config/hyspania.toml
//! ```
//!
//! Without `--config` the built-in defaults are used: listen on
//! `0.0.0.0:8080`, store documents under `./data`.

use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use hyspania::api::{build_router, AppState};
use hyspania::clock::SystemClock;
use hyspania::common::config::{load_config, AppConfig};
use hyspania::common::logging::init_logger;
use hyspania::identity::IdentityResolver;
use hyspania::store::FileStore;

/// Command-line arguments for the directory server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (TOML format)
    ///
    /// Example: config/hyspania.toml
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let config: AppConfig = match &args.config {
        Some(path) => {
            info!("📄 Loading configuration from {}", path);
            load_config(path)?
        }
        None => {
            info!("📄 No configuration file given, using defaults");
            AppConfig::default()
        }
    };

    info!("💾 Data directory: {}", config.storage.data_dir.display());
    let store = Arc::new(FileStore::new(config.storage.data_dir.clone()));
    let identity = IdentityResolver::new(
        config.identity.salt.clone(),
        config.identity.trust_proxy_headers,
    );
    let state = Arc::new(AppState::new(store, Arc::new(SystemClock), identity));

    let app = build_router(state);

    let listener = TcpListener::bind(&config.server.address).await?;
    info!("🌐 Directory API running on http://{}", config.server.address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
