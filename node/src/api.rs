// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::{DateTime, Utc};
use loop_kernel::types::EventId;
use loop_kernel::LedgerEvent;
use serde::{Deserialize, Deserializer, Serialize};

use crate::federation::NodeRecord;
use crate::store::Created;

pub const DEFAULT_EVENT_LIMIT: usize = 50;
pub const MAX_EVENT_LIMIT: usize = 200;

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Created> for CreatedResponse {
    fn from(c: Created) -> Self {
        Self {
            id: c.id,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct RelayAccepted {
    pub status: &'static str,
    pub id: EventId,
}

#[derive(Deserialize, Default)]
pub struct EventListParams {
    /// Kept raw so a malformed value falls back instead of failing the request.
    #[serde(default, deserialize_with = "lenient_limit")]
    pub limit: Option<f64>,
}

impl EventListParams {
    /// Missing, malformed, non-finite or non-positive -> 50; larger than
    /// 200 -> 200; fractions round down.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            Some(n) if n.is_finite() && n > 0.0 => (n.min(MAX_EVENT_LIMIT as f64) as usize).max(1),
            _ => DEFAULT_EVENT_LIMIT,
        }
    }
}

fn lenient_limit<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

#[derive(Serialize)]
pub struct EventListResponse {
    pub results: Vec<LedgerEvent>,
}

#[derive(Serialize)]
pub struct NodeListResponse {
    pub lab_only: bool,
    pub updated_at: String,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: String,
    pub uptime_seconds: u64,
}
