// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Live Distribution Hub
//!
//! Owns the set of connected stream subscribers and fans committed ledger
//! events out to them.
//!
//! # Subscriber lifecycle
//! `Connecting -> Open -> Closed`. A subscriber is `Open` once it holds a
//! registry slot and has been sent the open frame. Closing removes the slot
//! and cancels its keepalive; both happen exactly once no matter who closes
//! first (client disconnect, failed write, shutdown).
//!
//! # Invariants
//! - Registry size never exceeds `max_subscribers`
//! - Each open subscriber sees each published event at most once, in publish order
//! - A closed subscriber is never written to

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use loop_kernel::types::EventId;
use loop_kernel::LedgerEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::subscription::Subscription;
use crate::errors::LoopError;

pub type SubscriberId = u64;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub max_subscribers: usize,
    /// Zero disables keepalives.
    pub keepalive: Duration,
    /// Frames buffered per subscriber before it counts as too slow.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 100,
            keepalive: Duration::from_secs(15),
            channel_capacity: 64,
        }
    }
}

/// One unit written to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open,
    KeepAlive,
    Event {
        id: EventId,
        event_type: Arc<str>,
        data: Arc<str>,
    },
}

struct Slot {
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
}

pub struct DistributionHub {
    config: HubConfig,
    next_id: AtomicU64,
    slots: Mutex<HashMap<SubscriberId, Slot>>,
    shutdown: CancellationToken,
}

impl DistributionHub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            next_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new subscriber, or refuse when the ceiling is reached.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, LoopError> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = self.shutdown.child_token();

        let id = {
            let mut slots = self.slots.lock();
            if slots.len() >= self.config.max_subscribers || self.shutdown.is_cancelled() {
                metrics::counter!("loop_stream_rejected_total", 1);
                tracing::warn!(
                    active = slots.len(),
                    max = self.config.max_subscribers,
                    "Stream subscribe rejected at capacity"
                );
                return Err(LoopError::CapacityExceeded(self.config.max_subscribers));
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            // Fresh channel with capacity >= 1, cannot be full.
            let _ = tx.try_send(Frame::Open);
            slots.insert(
                id,
                Slot {
                    tx: tx.clone(),
                    cancel: cancel.clone(),
                },
            );
            id
        };

        metrics::increment_gauge!("loop_stream_subscribers", 1.0);
        tracing::debug!(subscriber = id, "Stream subscriber opened");

        self.spawn_keepalive(id, tx, cancel);
        Ok(Subscription::new(id, rx, Arc::clone(self)))
    }

    /// Send one event to every open subscriber. Returns how many accepted it.
    ///
    /// A subscriber whose channel is full or closed is evicted. Errors never
    /// reach the publisher.
    pub fn publish(&self, event: &LedgerEvent) -> usize {
        let data: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(event_id = %event.id, "Failed to serialize event for stream: {}", e);
                return 0;
            }
        };
        let frame = Frame::Event {
            id: event.id,
            event_type: event.event_type.as_str().into(),
            data,
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let slots = self.slots.lock();
            for (id, slot) in slots.iter() {
                match slot.tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => failed.push((*id, "subscriber too slow")),
                    Err(TrySendError::Closed(_)) => failed.push((*id, "subscriber gone")),
                }
            }
        }

        for (id, reason) in failed {
            self.evict(id, reason);
        }

        tracing::debug!(event_id = %event.id, delivered, "Event published to stream");
        delivered
    }

    /// Close one subscriber. Returns `false` if it was already closed.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let slot = self.slots.lock().remove(&id);
        match slot {
            Some(slot) => {
                slot.cancel.cancel();
                metrics::decrement_gauge!("loop_stream_subscribers", 1.0);
                tracing::debug!(subscriber = id, "Stream subscriber closed");
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, id: SubscriberId) -> bool {
        self.slots.lock().contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Close every subscriber and refuse new ones.
    pub fn close_all(&self) {
        self.shutdown.cancel();
        let drained: Vec<_> = self.slots.lock().drain().collect();
        for (_, slot) in &drained {
            slot.cancel.cancel();
        }
        if !drained.is_empty() {
            metrics::decrement_gauge!("loop_stream_subscribers", drained.len() as f64);
            tracing::info!("Closed {} stream subscribers", drained.len());
        }
    }

    fn evict(&self, id: SubscriberId, reason: &'static str) {
        if self.remove(id) {
            metrics::counter!("loop_stream_evicted_total", 1);
            tracing::warn!(subscriber = id, reason, "Stream subscriber evicted");
        }
    }

    fn spawn_keepalive(self: &Arc<Self>, id: SubscriberId, tx: mpsc::Sender<Frame>, cancel: CancellationToken) {
        let period = self.config.keepalive;
        if period.is_zero() {
            return;
        }
        let hub: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.try_send(Frame::KeepAlive).is_err() {
                            if let Some(hub) = hub.upgrade() {
                                hub.evict(id, "keepalive write failed");
                            }
                            break;
                        }
                    }
                }
            }
        });
    }
}
