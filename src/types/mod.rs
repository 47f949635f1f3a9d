// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Loop Protocol payload types.
//!
//! Payloads are typed per entity. Fields the core needs (ids, references,
//! quantity, status) are explicit; everything else a client sends is kept in
//! an `extensions` bag and written back verbatim.

use crate::error::{ValidationError, ValidationResult};
use chrono::DateTime;

pub mod id;
pub mod enums;
pub mod quantity;
pub mod entity;
pub mod node;
pub mod projection;

pub use entity::{LoopEntity, Material, Match, Offer, Transfer};
pub use enums::{EntityKind, Origin};
pub use id::EventId;
pub use node::{HandshakeAck, NodeDescriptor};
pub use projection::{MatchRef, MaterialRef, OfferRef};
pub use quantity::Quantity;

/// Protocol version this node speaks in handshakes and acknowledgements.
pub const SCHEMA_VERSION: &str = "0.1.1";

/// JSON-LD context advertised in acknowledgements.
pub const LOOP_CONTEXT: &str = "https://loop-protocol.org/v0.1.1";

pub(crate) fn require(field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

pub(crate) fn require_tag(expected: &'static str, found: &str) -> ValidationResult<()> {
    if found != expected {
        return Err(ValidationError::UnexpectedType {
            expected,
            found: found.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn require_timestamp(field: &'static str, value: &str) -> ValidationResult<()> {
    require(field, value)?;
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

pub(crate) fn optional_timestamp(field: &'static str, value: Option<&str>) -> ValidationResult<()> {
    match value {
        Some(v) => require_timestamp(field, v),
        None => Ok(()),
    }
}
