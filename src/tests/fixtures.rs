// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sample payloads and an in-memory projection for kernel tests.

use std::collections::HashMap;
use std::convert::Infallible;

use serde_json::{json, Map};

use crate::integrity::Projection;
use crate::types::{Match, MatchRef, Material, MaterialRef, Offer, OfferRef, Quantity, Transfer};

pub fn material(id: &str) -> Material {
    Material {
        context: Some("https://loop-protocol.org/v0.1.1".to_string()),
        type_tag: "MaterialDNA".to_string(),
        schema_version: "0.1.1".to_string(),
        id: id.to_string(),
        category: "plastic-pet".to_string(),
        quantity: Quantity::new(100.0, "kg"),
        quality: Some(0.92),
        origin_city: "Munich".to_string(),
        current_city: "Munich".to_string(),
        available_from: "2025-06-01T10:00:00Z".to_string(),
        expires: None,
        extensions: Map::new(),
    }
}

pub fn offer(id: &str, material_id: &str) -> Offer {
    Offer {
        context: None,
        type_tag: "Offer".to_string(),
        schema_version: "0.1.1".to_string(),
        id: id.to_string(),
        material_id: material_id.to_string(),
        from_city: "Munich".to_string(),
        to_city: "Berlin".to_string(),
        quantity: Quantity::new(80.0, "kg"),
        status: "open".to_string(),
        available_until: "2025-06-05T10:00:00Z".to_string(),
        terms: None,
        extensions: Map::new(),
    }
}

pub fn match_for(id: &str, material_id: &str, offer_id: &str) -> Match {
    Match {
        context: None,
        type_tag: "Match".to_string(),
        schema_version: "0.1.1".to_string(),
        id: id.to_string(),
        material_id: material_id.to_string(),
        offer_id: offer_id.to_string(),
        from_city: "Munich".to_string(),
        to_city: "Berlin".to_string(),
        status: "accepted".to_string(),
        matched_at: "2025-06-02T12:15:00Z".to_string(),
        extensions: Map::new(),
    }
}

pub fn transfer(id: &str, material_id: &str, match_id: &str) -> Transfer {
    let mut extensions = Map::new();
    extensions.insert("carrier".to_string(), json!({ "name": "Cargo Bike Co-op" }));
    Transfer {
        context: None,
        type_tag: "Transfer".to_string(),
        schema_version: "0.1.1".to_string(),
        id: id.to_string(),
        material_id: material_id.to_string(),
        match_id: match_id.to_string(),
        status: "completed".to_string(),
        handoff_at: "2025-06-02T14:00:00Z".to_string(),
        received_at: Some("2025-06-02T18:00:00Z".to_string()),
        extensions,
    }
}

/// HashMap-backed projection. Reads never fail.
#[derive(Default)]
pub struct MemoryProjection {
    pub materials: HashMap<String, MaterialRef>,
    pub offers: HashMap<String, OfferRef>,
    pub matches: HashMap<String, MatchRef>,
}

impl MemoryProjection {
    pub fn with_material(mut self, id: &str) -> Self {
        self.materials.insert(id.to_string(), MaterialRef { id: id.to_string() });
        self
    }

    pub fn with_offer(mut self, id: &str, material_id: &str) -> Self {
        self.offers.insert(
            id.to_string(),
            OfferRef { id: id.to_string(), material_id: material_id.to_string() },
        );
        self
    }

    pub fn with_match(mut self, id: &str, material_id: &str, offer_id: &str) -> Self {
        self.matches.insert(
            id.to_string(),
            MatchRef {
                id: id.to_string(),
                material_id: material_id.to_string(),
                offer_id: offer_id.to_string(),
            },
        );
        self
    }
}

impl Projection for MemoryProjection {
    type Error = Infallible;

    fn material(&self, id: &str) -> Result<Option<MaterialRef>, Infallible> {
        Ok(self.materials.get(id).cloned())
    }

    fn offer(&self, id: &str) -> Result<Option<OfferRef>, Infallible> {
        Ok(self.offers.get(id).cloned())
    }

    fn match_ref(&self, id: &str) -> Result<Option<MatchRef>, Infallible> {
        Ok(self.matches.get(id).cloned())
    }
}
