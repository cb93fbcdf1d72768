//! vigil-server - REST API server binary.

use std::net::SocketAddr;

use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vigil_core::config::VigilConfig;
use vigil_server::scheduler::DrainConfig;
use vigil_server::{create_server, AppState, DrainScheduler};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("vigil_server=debug".parse()?);

    // VIGIL_LOG_FORMAT=json switches to structured output
    let json = std::env::var("VIGIL_LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    // Get configuration from environment
    let host = std::env::var("VIGIL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("VIGIL_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let config = match std::env::var("VIGIL_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            VigilConfig::from_file(path)?
        }
        Err(_) => VigilConfig::from_env(),
    };
    if let Some(path) = &config.storage.db_path {
        info!(path = %path.display(), "Using SQLite store");
    }

    let state = AppState::from_config(config)?;
    let mut drain = DrainScheduler::new(state.clone(), DrainConfig::from_env()).await?;
    drain.start().await?;

    let app = create_server(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting vigil-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping drain scheduler...");
        })
        .await?;

    if let Err(e) = drain.shutdown().await {
        warn!(error = %e, "Drain scheduler did not shut down cleanly");
    }

    info!("Server stopped cleanly");
    Ok(())
}
