// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Lifecycle entities: Material -> Offer -> Match -> Transfer.
//!
//! Ids are externally assigned and globally unique. Records are created once
//! and never deleted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::enums::EntityKind;
use super::quantity::Quantity;
use super::{optional_timestamp, require, require_tag, require_timestamp};
use crate::error::{ValidationError, ValidationResult};

/// Common surface of the four lifecycle payloads.
pub trait LoopEntity: Serialize {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Structural checks that need no store access.
    fn check_schema(&self) -> ValidationResult<()>;
}

/// A batch of physical material ("MaterialDNA").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub schema_version: String,
    pub id: String,
    pub category: String,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    pub origin_city: String,
    pub current_city: String,
    pub available_from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl LoopEntity for Material {
    const KIND: EntityKind = EntityKind::Material;

    fn id(&self) -> &str {
        &self.id
    }

    fn check_schema(&self) -> ValidationResult<()> {
        require_tag(Self::KIND.type_tag(), &self.type_tag)?;
        require("schema_version", &self.schema_version)?;
        require("id", &self.id)?;
        require("category", &self.category)?;
        self.quantity.check()?;
        if let Some(q) = self.quality {
            if !(0.0..=1.0).contains(&q) {
                return Err(ValidationError::InvalidQuality(q));
            }
        }
        require("origin_city", &self.origin_city)?;
        require("current_city", &self.current_city)?;
        require_timestamp("available_from", &self.available_from)?;
        optional_timestamp("expires", self.expires.as_deref())
    }
}

/// A commercial proposal to move (part of) a material lot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub schema_version: String,
    pub id: String,
    pub material_id: String,
    pub from_city: String,
    pub to_city: String,
    pub quantity: Quantity,
    pub status: String,
    pub available_until: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl LoopEntity for Offer {
    const KIND: EntityKind = EntityKind::Offer;

    fn id(&self) -> &str {
        &self.id
    }

    fn check_schema(&self) -> ValidationResult<()> {
        require_tag(Self::KIND.type_tag(), &self.type_tag)?;
        require("schema_version", &self.schema_version)?;
        require("id", &self.id)?;
        require("material_id", &self.material_id)?;
        require("from_city", &self.from_city)?;
        require("to_city", &self.to_city)?;
        self.quantity.check()?;
        require("status", &self.status)?;
        require_timestamp("available_until", &self.available_until)
    }
}

/// Acceptance of an offer by a recipient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub schema_version: String,
    pub id: String,
    pub material_id: String,
    pub offer_id: String,
    pub from_city: String,
    pub to_city: String,
    pub status: String,
    pub matched_at: String,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl LoopEntity for Match {
    const KIND: EntityKind = EntityKind::Match;

    fn id(&self) -> &str {
        &self.id
    }

    fn check_schema(&self) -> ValidationResult<()> {
        require_tag(Self::KIND.type_tag(), &self.type_tag)?;
        require("schema_version", &self.schema_version)?;
        require("id", &self.id)?;
        require("material_id", &self.material_id)?;
        require("offer_id", &self.offer_id)?;
        require("from_city", &self.from_city)?;
        require("to_city", &self.to_city)?;
        require("status", &self.status)?;
        require_timestamp("matched_at", &self.matched_at)
    }
}

/// Completed physical hand-off of a matched lot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub schema_version: String,
    pub id: String,
    pub material_id: String,
    pub match_id: String,
    pub status: String,
    pub handoff_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl LoopEntity for Transfer {
    const KIND: EntityKind = EntityKind::Transfer;

    fn id(&self) -> &str {
        &self.id
    }

    fn check_schema(&self) -> ValidationResult<()> {
        require_tag(Self::KIND.type_tag(), &self.type_tag)?;
        require("schema_version", &self.schema_version)?;
        require("id", &self.id)?;
        require("material_id", &self.material_id)?;
        require("match_id", &self.match_id)?;
        require("status", &self.status)?;
        require_timestamp("handoff_at", &self.handoff_at)?;
        optional_timestamp("received_at", self.received_at.as_deref())
    }
}
