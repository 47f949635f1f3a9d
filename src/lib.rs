// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! loop-kernel: domain model and integrity rules for the Loop material ledger.
//!
//! Everything here is pure: typed payloads for materials, offers, matches and
//! transfers, the ledger event model, and the referential integrity checks that
//! gate every write. Storage, distribution and federation live in `loop-node`.

pub mod error;
pub mod types;
pub mod event;
pub mod integrity;

pub use error::{IntegrityViolation, Rejected, ValidationError};
pub use event::{EventDraft, LedgerEvent, RelayEnvelope};
pub use integrity::{Projection, Validated};

#[cfg(test)]
pub mod tests;
