// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Minimal views of stored entities, just enough for integrity checks.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaterialRef {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfferRef {
    pub id: String,
    pub material_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchRef {
    pub id: String,
    pub material_id: String,
    pub offer_id: String,
}
