// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Ledger
//!
//! The ledger is the primary truth: every accepted write lands as one
//! append-only event, committed together with its entity row.
//!
//! # Guarantees
//! - Entity row and event commit in one SQLite transaction
//! - Validation runs inside that transaction, against the same snapshot
//! - Side effects (stream publish, peer forwarding) run only after commit
//! - Side-effect failures are logged, never surfaced, never retried

pub mod ledger;

pub use ledger::LedgerWriter;
