// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger Enums.

use serde::{Serialize, Deserialize};

/// The four entity tables of the lifecycle projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Material,
    Offer,
    Match,
    Transfer,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Material => "material",
            EntityKind::Offer => "offer",
            EntityKind::Match => "match",
            EntityKind::Transfer => "transfer",
        }
    }

    /// `@type` discriminator carried by payloads of this kind.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EntityKind::Material => "MaterialDNA",
            EntityKind::Offer => "Offer",
            EntityKind::Match => "Match",
            EntityKind::Transfer => "Transfer",
        }
    }

    /// Event type for the creation of an entity, `<entity>.created`.
    pub fn created_event(&self) -> &'static str {
        match self {
            EntityKind::Material => "material.created",
            EntityKind::Offer => "offer.created",
            EntityKind::Match => "match.created",
            EntityKind::Transfer => "transfer.created",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a ledger event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Accepted through a local create call and integrity-checked here.
    Local,
    /// Forwarded by a peer node; recorded log-only.
    Relayed,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Relayed => "relayed",
        }
    }
}
