// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sample lifecycle payloads, built from the same JSON a client would send.

use loop_kernel::types::{Match, Material, Offer, Transfer};
use serde_json::json;

pub fn material(id: &str) -> Material {
    serde_json::from_value(json!({
        "@context": "https://loop-protocol.org/v0.1.1",
        "@type": "MaterialDNA",
        "schema_version": "0.1.1",
        "id": id,
        "category": "plastic-pet",
        "quantity": { "value": 100.0, "unit": "kg" },
        "quality": 0.92,
        "origin_city": "Munich",
        "current_city": "Munich",
        "available_from": "2025-06-01T10:00:00Z"
    }))
    .unwrap()
}

pub fn offer(id: &str, material_id: &str) -> Offer {
    serde_json::from_value(json!({
        "@type": "Offer",
        "schema_version": "0.1.1",
        "id": id,
        "material_id": material_id,
        "from_city": "Munich",
        "to_city": "Berlin",
        "quantity": { "value": 80.0, "unit": "kg" },
        "status": "open",
        "available_until": "2025-06-05T10:00:00Z"
    }))
    .unwrap()
}

pub fn match_for(id: &str, material_id: &str, offer_id: &str) -> Match {
    serde_json::from_value(json!({
        "@type": "Match",
        "schema_version": "0.1.1",
        "id": id,
        "material_id": material_id,
        "offer_id": offer_id,
        "from_city": "Munich",
        "to_city": "Berlin",
        "status": "accepted",
        "matched_at": "2025-06-02T12:15:00Z"
    }))
    .unwrap()
}

pub fn transfer(id: &str, material_id: &str, match_id: &str) -> Transfer {
    serde_json::from_value(json!({
        "@type": "Transfer",
        "schema_version": "0.1.1",
        "id": id,
        "material_id": material_id,
        "match_id": match_id,
        "status": "completed",
        "handoff_at": "2025-06-02T14:00:00Z",
        "carrier": { "name": "Cargo Bike Co-op" }
    }))
    .unwrap()
}
