// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Live push distribution of ledger events to connected clients.

pub mod hub;
pub mod subscription;

pub use hub::{DistributionHub, Frame, HubConfig, SubscriberId};
pub use subscription::Subscription;
