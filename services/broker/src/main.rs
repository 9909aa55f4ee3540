//! hyperbridge
//!
//! Issues VLESS keys on the least-loaded panel of the pool described by
//! `{DATA_DIR}/servers.json`.

use std::sync::Arc;

use anyhow::Result;
use hyperbridge_broker::{
    api,
    broker::{Broker, BrokerSettings},
    config,
    gateway::PanelGateway,
    history::LoadHistory,
    registry::NodeRegistry,
    state::AppState,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to HYPERBRIDGE_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting hyperbridge");
    info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        panel_timeout_ms = config.panel_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let gateway = match PanelGateway::new(config.panel_timeout) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!(error = %e, "Failed to build panel HTTP client");
            return Err(e.into());
        }
    };

    let registry = NodeRegistry::new(config.servers_path());
    match registry.list_enabled_nodes().await {
        Ok(nodes) => info!(node_count = nodes.len(), "Node registry loaded"),
        // Not fatal: the registry is re-read on every request.
        Err(e) => error!(error = %e, "Node registry is unreadable"),
    }

    let broker = Broker::new(
        registry,
        LoadHistory::new(config.loads_path()),
        gateway,
        BrokerSettings {
            node_timeout: config.panel_timeout,
            brand: config.brand.clone(),
        },
    );

    let app = api::create_router(AppState::new(broker));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await;

    match result {
        Ok(()) => info!("hyperbridge shutdown complete"),
        Err(e) => {
            error!(error = %e, "Server error");
            return Err(e.into());
        }
    }

    Ok(())
}
