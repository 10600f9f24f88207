//! asyncrest server
//!
//! Entry point: configuration loading, task workers and HTTP server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::StatusCode, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use asyncrest_server::bootstrap::build_state;
use asyncrest_server::build_router;

mod auth_builder;
mod cli;
mod config_helpers;
mod tracing_setup;

use auth_builder::build_authenticator_from_config;
use cli::CliArgs;
use config_helpers::{parse_bind_address, service_unavailable_handler};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = asyncrest_config::load_config(args.config_path.as_deref()).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    asyncrest_config::validate_config(&config)?;

    install_tracing_from_config(&config.logging);
    info!(config_path = ?args.config_path, "configuration loaded");

    let app = match build_authenticator_from_config(&config) {
        Ok((authenticator, info)) => {
            info!(
                auth_mode = %info.mode,
                key_type = info.key_type.as_deref().unwrap_or("-"),
                "authentication configured"
            );
            let (state, _documents) = build_state(&config, authenticator).await?;
            if !config.queue.eager {
                let workers = state.task_queue.start_workers(config.queue.workers);
                info!(workers = workers.len(), "task workers started");
            }
            build_router(Arc::new(state))
        }
        Err(reason) => {
            error!(%reason, "entering maintenance mode due to authentication configuration");
            maintenance_router()
        }
    };

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

fn maintenance_router() -> Router {
    Router::new()
        .route(
            "/api/health",
            axum::routing::get(|| async { (StatusCode::OK, "OK") }),
        )
        .route(
            "/api/ready",
            axum::routing::get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        )
        .fallback(service_unavailable_handler)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
