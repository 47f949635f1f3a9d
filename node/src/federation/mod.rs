// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Federation
//!
//! Lab-grade multi-node wiring: a registry of known nodes filled by
//! handshakes, an inbound relay that records peer events, and an outbound
//! forwarder that pushes local events to configured peers.
//!
//! Identities are taken as asserted. Nothing verifies `public_key` or
//! `signature`; this only holds among a closed set of cooperating nodes.

pub mod forwarder;
pub mod registry;
pub mod relay;

pub use forwarder::{handshake_peers, spawn_forwarder, ForwardQueue};
pub use registry::{LocalNode, NodeRecord, NodeRegistry};
pub use relay::FederationRelay;
