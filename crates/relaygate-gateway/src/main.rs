//! relaygate gateway binary.
//!
//! - Raw TCP listener (`gateway.listen`)
//! - HTTP listener (`gateway.http_listen`): `/v1/ws`, `/healthz`, `/readyz`, `/metrics`
//! - Offline pipeline drained into the in-memory store
//!
//! Usage: `relaygate-gateway [config.yaml]` (default `relaygate.yaml`).

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use relaygate_core::error::{RelayError, Result};
use relaygate_gateway::{app_state::AppState, config, offline, router, transport};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "relaygate.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.gateway.listen_addr()?;
    let http_listen = cfg.gateway.http_addr()?;

    let state = AppState::new(cfg);
    let drain = offline::spawn_drain(state.offline().attach()?, state.offline_store());

    let tcp = TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Internal(format!("bind {listen} failed: {e}")))?;
    let http = TcpListener::bind(http_listen)
        .await
        .map_err(|e| RelayError::Internal(format!("bind {http_listen} failed: {e}")))?;

    tracing::info!(%listen, %http_listen, config = %path, "relaygate-gateway starting");

    let tcp_task = tokio::spawn(transport::tcp::serve(state.clone(), tcp));

    let app = router::build_router(state.clone());
    let shutdown_state = state.clone();
    axum::serve(http, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested, draining");
            shutdown_state.set_draining();
        })
        .await
        .map_err(|e| RelayError::Internal(format!("http server failed: {e}")))?;

    tcp_task.abort();
    tracing::info!(
        backlog = state.offline().backlog(),
        stored = state.offline_store().total(),
        "relaygate-gateway stopped"
    );
    drain.abort();
    Ok(())
}
