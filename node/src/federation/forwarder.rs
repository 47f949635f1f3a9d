// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Outbound federation: startup handshakes and peer forwarding.
//!
//! Only locally-originated events enter the forward queue, so a relayed
//! event is never sent on again. Delivery is best-effort with no retry.

use loop_kernel::{LedgerEvent, RelayEnvelope};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::NodeRegistry;
use crate::network::PeerClient;

/// Bounded hand-off from the ledger writer to the forwarding task.
#[derive(Debug, Clone)]
pub struct ForwardQueue {
    tx: mpsc::Sender<LedgerEvent>,
}

impl ForwardQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LedgerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Never blocks. A full or closed queue drops the event.
    pub fn enqueue(&self, event: &LedgerEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::counter!("loop_forward_failures_total", 1, "reason" => "queue_full");
                tracing::warn!(event_id = %event.id, "Forward queue full, event not sent to peers");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(event_id = %event.id, "Forwarder stopped, event not sent to peers");
            }
        }
    }
}

/// Drain the queue, POSTing each event to every peer's relay endpoint.
pub fn spawn_forwarder(
    mut rx: mpsc::Receiver<LedgerEvent>,
    client: PeerClient,
    peers: Vec<String>,
    local_node_id: String,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Forwarding local events to {} peer(s)", peers.len());
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(event) => event,
                    None => break,
                },
            };

            let envelope = RelayEnvelope::from_event(&event, &local_node_id);
            for peer in &peers {
                match client.relay(peer, &envelope).await {
                    Ok(()) => tracing::debug!(event_id = %event.id, peer = %peer, "Event forwarded"),
                    Err(e) => {
                        metrics::counter!("loop_forward_failures_total", 1, "reason" => "peer_error");
                        tracing::warn!(event_id = %event.id, peer = %peer, "Forward failed: {}", e);
                    }
                }
            }
        }
        tracing::info!("Forwarder stopped");
    })
}

/// Introduce this node to every configured peer and register those that
/// answer. Returns how many acknowledged.
pub async fn handshake_peers(client: &PeerClient, registry: &NodeRegistry, peers: &[String]) -> usize {
    let descriptor = registry.descriptor();
    let mut acknowledged = 0;

    for peer in peers {
        match client.handshake(peer, &descriptor).await {
            Ok(ack) => {
                registry.upsert(&ack.peer_id, &ack.peer_id, peer, ack.capabilities);
                metrics::counter!("loop_federation_handshakes_total", 1, "direction" => "outbound");
                tracing::info!(peer = %peer, peer_id = %ack.peer_id, "Peer acknowledged handshake");
                acknowledged += 1;
            }
            Err(e) => tracing::warn!(peer = %peer, "Startup handshake failed: {}", e),
        }
    }

    acknowledged
}
