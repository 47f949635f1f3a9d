// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Ledger Writer - the commit barrier
//!
//! 1. Validate the payload against the projection (inside the transaction)
//! 2. Insert the entity row
//! 3. Append the ledger event
//! 4. Commit
//! 5. Publish to the hub and queue for peers
//!
//! If any of 1-4 fails the transaction rolls back and nothing is published.

use std::sync::Arc;
use std::time::Instant;

use loop_kernel::integrity::{validate_match, validate_material, validate_offer, validate_transfer};
use loop_kernel::types::{LoopEntity, Match, Material, Offer, Origin, Transfer};
use loop_kernel::{EventDraft, LedgerEvent, Rejected, RelayEnvelope, Validated};
use tokio::sync::Mutex;

use crate::errors::LoopError;
use crate::federation::ForwardQueue;
use crate::store::{self, Created, LoopStore, StoreError, StoreTx};
use crate::stream::DistributionHub;

/// Writes are serialized behind one async mutex and run inline on the
/// calling worker, fsync included.
#[derive(Clone)]
pub struct LedgerWriter {
    store: Arc<Mutex<LoopStore>>,
    hub: Arc<DistributionHub>,
    forward: Option<ForwardQueue>,
}

impl LedgerWriter {
    pub fn new(store: LoopStore, hub: Arc<DistributionHub>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            hub,
            forward: None,
        }
    }

    /// Queue locally-originated events for peer forwarding.
    pub fn with_forwarding(mut self, queue: ForwardQueue) -> Self {
        self.forward = Some(queue);
        self
    }

    pub fn hub(&self) -> &Arc<DistributionHub> {
        &self.hub
    }

    pub async fn record_material(&self, material: Material) -> Result<Created, LoopError> {
        self.commit(material, |_, m| validate_material(m), |tx, m| tx.create_material(m))
            .await
    }

    pub async fn record_offer(&self, offer: Offer) -> Result<Created, LoopError> {
        self.commit(offer, |tx, o| validate_offer(tx, o), |tx, o| tx.create_offer(o))
            .await
    }

    pub async fn record_match(&self, candidate: Match) -> Result<Created, LoopError> {
        self.commit(candidate, |tx, x| validate_match(tx, x), |tx, x| tx.create_match(x))
            .await
    }

    pub async fn record_transfer(&self, transfer: Transfer) -> Result<Created, LoopError> {
        self.commit(transfer, |tx, t| validate_transfer(tx, t), |tx, t| tx.create_transfer(t))
            .await
    }

    /// Record an event forwarded by a peer.
    ///
    /// Only the envelope shape is checked; no integrity validation runs and no
    /// entity row is written.
    pub async fn record_relayed(&self, envelope: RelayEnvelope) -> Result<LedgerEvent, LoopError> {
        let draft = envelope.into_draft(&store::now())?;

        let started = Instant::now();
        let mut store = self.store.lock().await;
        let appended = store.write(|tx| tx.append_event(&draft))?;
        let event = draft.into_record(appended.id, appended.created_at);

        metrics::histogram!("loop_ledger_commit_duration_seconds", started.elapsed().as_secs_f64());
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            source_node = event.payload["source_node"].as_str().unwrap_or_default(),
            "Relayed event recorded"
        );

        self.dispatch_side_effects(&event, Origin::Relayed);
        Ok(event)
    }

    /// Newest first.
    pub async fn list_events(&self, limit: usize) -> Result<Vec<LedgerEvent>, LoopError> {
        let store = self.store.lock().await;
        Ok(store.list_events(limit)?)
    }

    async fn commit<T, V, I>(&self, entity: T, validate: V, insert: I) -> Result<Created, LoopError>
    where
        T: LoopEntity,
        V: FnOnce(&StoreTx<'_>, T) -> Result<Validated<T>, Rejected<StoreError>>,
        I: FnOnce(&StoreTx<'_>, &Validated<T>) -> store::Result<Created>,
    {
        let started = Instant::now();
        let mut store = self.store.lock().await;

        let outcome = store.write(|tx| {
            let valid = validate(tx, entity)?;
            let created = insert(tx, &valid)?;
            let draft = EventDraft::created(valid.get(), &created.created_at)
                .map_err(|e| LoopError::Internal(format!("event body: {}", e)))?;
            let appended = tx.append_event(&draft)?;
            Ok::<_, LoopError>((created, draft.into_record(appended.id, appended.created_at)))
        });

        let (created, event) = match outcome {
            Ok(done) => done,
            Err(e) => {
                if e.status().is_client_error() {
                    tracing::debug!(entity = %T::KIND, kind = e.kind(), "Write rejected: {}", e);
                } else {
                    tracing::error!(entity = %T::KIND, "Write failed: {}", e);
                }
                return Err(e);
            }
        };

        metrics::histogram!("loop_ledger_commit_duration_seconds", started.elapsed().as_secs_f64());
        metrics::counter!("loop_entities_created_total", 1, "entity" => T::KIND.as_str());
        tracing::info!(
            entity = %T::KIND,
            id = %created.id,
            event_id = %event.id,
            "Entity recorded"
        );

        // Still under the store lock, so subscribers see ledger order.
        self.dispatch_side_effects(&event, Origin::Local);
        Ok(created)
    }

    /// Post-commit, non-durable work. Must never fail the write.
    fn dispatch_side_effects(&self, event: &LedgerEvent, origin: Origin) {
        metrics::counter!("loop_events_appended_total", 1, "origin" => origin.as_str());

        self.hub.publish(event);

        if origin == Origin::Local {
            if let Some(queue) = &self.forward {
                queue.enqueue(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Frame, HubConfig};
    use crate::testing::{material, match_for, offer, transfer};
    use futures::{FutureExt, StreamExt};
    use serde_json::json;
    use std::time::Duration;

    fn writer() -> LedgerWriter {
        let hub = DistributionHub::new(HubConfig {
            keepalive: Duration::ZERO,
            ..HubConfig::default()
        });
        LedgerWriter::new(LoopStore::open_in_memory().unwrap(), hub)
    }

    #[tokio::test]
    async fn test_lifecycle_events_in_order() {
        let ledger = writer();
        ledger.record_material(material("M1")).await.unwrap();
        ledger.record_offer(offer("O1", "M1")).await.unwrap();
        ledger.record_match(match_for("X1", "M1", "O1")).await.unwrap();
        ledger.record_transfer(transfer("T1", "M1", "X1")).await.unwrap();

        let mut events = ledger.list_events(50).await.unwrap();
        events.reverse();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            ["material.created", "offer.created", "match.created", "transfer.created"]
        );
        assert!(events.windows(2).all(|w| w[0].id < w[1].id));

        let transfer_event = &events[3];
        assert_eq!(transfer_event.entity_type, "transfer");
        assert_eq!(transfer_event.entity_id, "T1");
        assert_eq!(transfer_event.payload["data"]["carrier"]["name"], "Cargo Bike Co-op");
    }

    #[tokio::test]
    async fn test_rejected_write_appends_nothing() {
        let ledger = writer();
        ledger.record_material(material("M1")).await.unwrap();
        ledger.record_material(material("M2")).await.unwrap();
        ledger.record_offer(offer("O1", "M1")).await.unwrap();

        let err = ledger.record_offer(offer("O2", "missing")).await.unwrap_err();
        assert_eq!(err.kind(), "integrity_violation");

        let err = ledger.record_match(match_for("X1", "M2", "O1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Offer O1 belongs to material M1, not M2");

        let err = ledger.record_material(material("M1")).await.unwrap_err();
        assert!(matches!(err, LoopError::Conflict { .. }));

        assert_eq!(ledger.list_events(200).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_publish_after_commit() {
        let ledger = writer();
        let mut sub = ledger.hub().subscribe().unwrap();
        assert_eq!(sub.next().await, Some(Frame::Open));

        let _ = ledger.record_offer(offer("O1", "missing")).await;
        let created = ledger.record_material(material("M1")).await.unwrap();

        match sub.next().await {
            Some(Frame::Event { event_type, data, .. }) => {
                assert_eq!(&*event_type, "material.created");
                let body: serde_json::Value = serde_json::from_str(&data).unwrap();
                assert_eq!(body["entity_id"], created.id);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relayed_event_skips_integrity() {
        let ledger = writer();
        let mut sub = ledger.hub().subscribe().unwrap();
        sub.next().await;

        let event = ledger
            .record_relayed(RelayEnvelope {
                event_type: "offer.created".to_string(),
                entity_type: "offer".to_string(),
                entity_id: "O-remote".to_string(),
                payload: json!({ "data": { "material_id": "nowhere" } }),
                source_node: Some("munich.loop".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(event.payload["source_node"], "munich.loop");
        assert!(event.payload["relayed_at"].is_string());
        assert!(matches!(sub.next().await, Some(Frame::Event { id, .. }) if id == event.id));
        assert!(sub.next().now_or_never().is_none());

        // Log-only: no offer row exists afterwards.
        let err = ledger.record_match(match_for("X1", "nowhere", "O-remote")).await.unwrap_err();
        assert_eq!(err.kind(), "integrity_violation");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_stream_in_ledger_order() {
        let ledger = writer();
        let mut sub = ledger.hub().subscribe().unwrap();
        assert_eq!(sub.next().await, Some(Frame::Open));

        let writes: Vec<_> = (0..40)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.record_material(material(&format!("M{}", i))).await })
            })
            .collect();
        for write in writes {
            write.await.unwrap().unwrap();
        }

        let mut seen = Vec::new();
        while let Some(Some(frame)) = sub.next().now_or_never() {
            match frame {
                Frame::Event { id, .. } => seen.push(id),
                other => panic!("unexpected frame {:?}", other),
            }
        }
        assert_eq!(seen.len(), 40);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));

        let mut ledger_ids: Vec<_> = ledger.list_events(200).await.unwrap().into_iter().map(|e| e.id).collect();
        ledger_ids.reverse();
        assert_eq!(seen, ledger_ids);
    }
}
