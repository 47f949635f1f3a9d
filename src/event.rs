// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger events.
//!
//! The ledger is the single source of truth for "what happened and in what
//! order". Entity tables are a projection for integrity lookups only.
//!
//! # Invariants
//! - Event ids are assigned by the store, strictly increasing
//! - Events are immutable once appended
//! - `event_type` is `<entity>.<action>` and `entity_type` equals `<entity>`
//! - Relayed events carry `source_node` and `relayed_at` inside the payload

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ValidationError, ValidationResult};
use crate::types::{EventId, LoopEntity};

/// Source tag recorded when a relay envelope does not name its sender.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// A committed ledger record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: EventId,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// An event before the store has given it an id.
#[derive(Clone, Debug, PartialEq)]
pub struct EventDraft {
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
}

impl EventDraft {
    /// `<entity>.created` for a freshly written entity.
    ///
    /// Body: `{type, entity, entity_id, data, created_at}` with `data` the
    /// accepted payload.
    pub fn created<T: LoopEntity>(
        entity: &T,
        created_at: &DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let event_type = T::KIND.created_event();
        let entity_type = T::KIND.as_str();
        let payload = json!({
            "type": event_type,
            "entity": entity_type,
            "entity_id": entity.id(),
            "data": serde_json::to_value(entity)?,
            "created_at": format_timestamp(created_at),
        });

        Ok(Self {
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity.id().to_string(),
            payload,
        })
    }

    pub fn into_record(self, id: EventId, created_at: DateTime<Utc>) -> LedgerEvent {
        LedgerEvent {
            id,
            event_type: self.event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            payload: self.payload,
            created_at,
        }
    }
}

/// An event forwarded by a peer node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node: Option<String>,
}

impl RelayEnvelope {
    /// Envelope for forwarding a locally committed event to a peer.
    pub fn from_event(event: &LedgerEvent, source_node: &str) -> Self {
        Self {
            event_type: event.event_type.clone(),
            entity_type: event.entity_type.clone(),
            entity_id: event.entity_id.clone(),
            payload: event.payload.clone(),
            source_node: Some(source_node.to_string()),
        }
    }

    /// Well-formedness only. The sending node is trusted to have run its own
    /// integrity checks.
    pub fn check(&self) -> ValidationResult<()> {
        let (entity, _action) = split_event_type(&self.event_type)?;
        if self.entity_type != entity {
            return Err(ValidationError::EntityTypeMismatch {
                event_type: self.event_type.clone(),
                entity_type: self.entity_type.clone(),
            });
        }
        if self.entity_id.trim().is_empty() {
            return Err(ValidationError::MissingField("entity_id"));
        }
        if !self.payload.is_object() {
            return Err(ValidationError::PayloadNotObject);
        }
        Ok(())
    }

    /// Check the envelope and stamp provenance into its payload.
    ///
    /// An explicit `source_node` on the envelope wins over one already inside
    /// the payload; with neither, the source is recorded as `unknown`.
    pub fn into_draft(self, relayed_at: &DateTime<Utc>) -> ValidationResult<EventDraft> {
        self.check()?;

        let mut body: Map<String, Value> = match self.payload {
            Value::Object(map) => map,
            _ => return Err(ValidationError::PayloadNotObject),
        };

        let source = match self.source_node.filter(|s| !s.trim().is_empty()) {
            Some(s) => Value::String(s),
            None => body
                .get("source_node")
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .cloned()
                .unwrap_or_else(|| Value::String(UNKNOWN_SOURCE.to_string())),
        };
        body.insert("source_node".to_string(), source);
        body.insert(
            "relayed_at".to_string(),
            Value::String(format_timestamp(relayed_at)),
        );

        Ok(EventDraft {
            event_type: self.event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            payload: Value::Object(body),
        })
    }
}

/// Split `<entity>.<action>`; both segments lowercase ASCII, digits or `_`,
/// starting with a letter.
pub fn split_event_type(event_type: &str) -> ValidationResult<(&str, &str)> {
    let malformed = || ValidationError::MalformedEventType(event_type.to_string());
    let (entity, action) = event_type.split_once('.').ok_or_else(malformed)?;
    if !is_segment(entity) || !is_segment(action) {
        return Err(malformed());
    }
    Ok((entity, action))
}

fn is_segment(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
