// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use chrono::Utc;
use loop_kernel::event::format_timestamp;
use loop_kernel::types::{HandshakeAck, NodeDescriptor};
use loop_kernel::{LedgerEvent, RelayEnvelope};

use super::registry::NodeRegistry;
use crate::errors::LoopError;
use crate::events::LedgerWriter;

/// Inbound side of federation.
#[derive(Clone)]
pub struct FederationRelay {
    ledger: LedgerWriter,
    registry: Arc<NodeRegistry>,
}

impl FederationRelay {
    pub fn new(ledger: LedgerWriter, registry: Arc<NodeRegistry>) -> Self {
        Self { ledger, registry }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Register (or refresh) the remote node and answer with our identity.
    pub fn handshake(&self, remote: NodeDescriptor) -> Result<HandshakeAck, LoopError> {
        remote.check()?;

        let record = self.registry.upsert(
            &remote.node_id,
            &remote.name,
            &remote.endpoint,
            remote.capabilities,
        );
        metrics::counter!("loop_federation_handshakes_total", 1, "direction" => "inbound");
        tracing::info!(
            node_id = %record.node_id,
            endpoint = %record.endpoint,
            signed = remote.signature.is_some(),
            "Handshake accepted"
        );

        let local = self.registry.local();
        Ok(HandshakeAck::accepted(
            local.node_id.clone(),
            local.capabilities.clone(),
            &record.node_id,
            format_timestamp(&Utc::now()),
        ))
    }

    /// Record a peer's event as relayed and publish it. Log-only: no entity
    /// row is created for it.
    pub async fn relay(&self, envelope: RelayEnvelope) -> Result<LedgerEvent, LoopError> {
        self.ledger.record_relayed(envelope).await
    }
}
