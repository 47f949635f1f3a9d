// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.
//!
//! Two families of rejection exist before anything touches storage:
//! - `ValidationError`: the payload itself is malformed
//! - `IntegrityViolation`: the payload is well-formed but references state
//!   that does not exist, or exists with a different material
//!
//! Neither is retryable with the same payload.

use thiserror::Error;

/// Malformed input. Fails fast, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unexpected @type: expected {expected}, found {found}")]
    UnexpectedType { expected: &'static str, found: String },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("invalid timestamp in {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("quality must be within [0, 1], got {0}")]
    InvalidQuality(f64),

    #[error("malformed event type: {0}")]
    MalformedEventType(String),

    #[error("entity_type {entity_type} does not match event_type {event_type}")]
    EntityTypeMismatch { event_type: String, entity_type: String },

    #[error("payload must be a JSON object")]
    PayloadNotObject,
}

/// A well-formed payload that breaks the material -> offer -> match -> transfer chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    #[error("Unknown material_id: {0}")]
    UnknownMaterial(String),

    #[error("Unknown offer_id: {0}")]
    UnknownOffer(String),

    #[error("Unknown match_id: {0}")]
    UnknownMatch(String),

    #[error("Offer {offer_id} belongs to material {found}, not {expected}")]
    OfferMaterialMismatch {
        offer_id: String,
        expected: String,
        found: String,
    },

    #[error("Match {match_id} belongs to material {found}, not {expected}")]
    MatchMaterialMismatch {
        match_id: String,
        expected: String,
        found: String,
    },
}

impl IntegrityViolation {
    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            IntegrityViolation::UnknownMaterial(_) => "unknown_material",
            IntegrityViolation::UnknownOffer(_) => "unknown_offer",
            IntegrityViolation::UnknownMatch(_) => "unknown_match",
            IntegrityViolation::OfferMaterialMismatch { .. } => "offer_material_mismatch",
            IntegrityViolation::MatchMaterialMismatch { .. } => "match_material_mismatch",
        }
    }
}

/// Outcome of a failed validator run.
///
/// `E` is the error type of the projection the validator read from. A read
/// failure is passed through untouched so storage outages are never reported
/// as bad input.
#[derive(Error, Debug)]
pub enum Rejected<E> {
    #[error(transparent)]
    Schema(#[from] ValidationError),

    #[error(transparent)]
    Integrity(#[from] IntegrityViolation),

    #[error("projection read failed: {0}")]
    Projection(E),
}

pub type ValidationResult<T> = core::result::Result<T, ValidationError>;
