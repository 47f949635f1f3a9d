// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use loop_node::config::{NodeArgs, NodeConfig};
use loop_node::federation::{handshake_peers, spawn_forwarder, ForwardQueue};
use loop_node::network::PeerClient;
use loop_node::server::{build_router, AppState};
use loop_node::store::LoopStore;
use loop_node::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry()?;

    let cfg: NodeConfig = NodeArgs::parse().into();
    tracing::info!(
        node_id = %cfg.node.node_id,
        bind = %cfg.bind_addr,
        "Initializing Loop node"
    );

    let store = match &cfg.database_path {
        Some(path) => LoopStore::open(path).with_context(|| format!("opening store at {:?}", path))?,
        None => {
            tracing::warn!("No database path configured, ledger is in-memory only");
            LoopStore::open_in_memory()?
        }
    };

    let shutdown = CancellationToken::new();
    let federation = &cfg.federation;

    let forward = if federation.peers.is_empty() {
        None
    } else {
        tracing::warn!(
            "Federation enabled with {} peer(s): identities are not verified, use only among trusted nodes",
            federation.peers.len()
        );
        let client = PeerClient::new(federation.peer_timeout, federation.peer_api_key.clone())?;
        let (queue, rx) = ForwardQueue::channel(federation.forward_queue);
        spawn_forwarder(
            rx,
            client.clone(),
            federation.peers.clone(),
            cfg.node.node_id.clone(),
            shutdown.clone(),
        );
        Some((queue, client))
    };

    let state = AppState::new(&cfg, store, forward.as_ref().map(|(queue, _)| queue.clone()));

    if let Some((_, client)) = forward {
        let registry = state.registry().clone();
        let peers = federation.peers.clone();
        tokio::spawn(async move {
            let acknowledged = handshake_peers(&client, &registry, &peers).await;
            tracing::info!("Startup handshake: {}/{} peer(s) acknowledged", acknowledged, peers.len());
        });
    }

    let hub = state.hub.clone();
    let app = build_router(state, &cfg);

    let listener = TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!("Listening on {}", cfg.bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
            hub.close_all();
        })
        .await?;

    tracing::info!("Loop node stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
