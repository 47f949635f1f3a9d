// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Integrity Validator
//!
//! Pure checks of a candidate payload against the current projection. Nothing
//! here mutates state.
//!
//! A successful check returns a [`Validated`] wrapper. The store's write path
//! only accepts `Validated<T>`, and only this module can build one, so a
//! write that skipped validation does not type-check.
//!
//! # Rules
//! - Offer: `material_id` exists
//! - Match: `material_id` and `offer_id` exist, offer.material_id == match.material_id
//! - Transfer: `material_id` and `match_id` exist, match.material_id == transfer.material_id

use crate::error::{IntegrityViolation, Rejected};
use crate::types::{LoopEntity, Match, MatchRef, Material, MaterialRef, Offer, OfferRef, Transfer};

/// Read access to the entity projection.
pub trait Projection {
    type Error;

    fn material(&self, id: &str) -> Result<Option<MaterialRef>, Self::Error>;
    fn offer(&self, id: &str) -> Result<Option<OfferRef>, Self::Error>;
    fn match_ref(&self, id: &str) -> Result<Option<MatchRef>, Self::Error>;
}

/// Proof that `T` passed schema and integrity checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    inner: T,
}

impl<T> Validated<T> {
    fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn get(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> core::ops::Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

/// Materials reference nothing, so only the schema is checked.
pub fn validate_material<E>(material: Material) -> Result<Validated<Material>, Rejected<E>> {
    material.check_schema()?;
    Ok(Validated::new(material))
}

pub fn validate_offer<P: Projection>(
    projection: &P,
    offer: Offer,
) -> Result<Validated<Offer>, Rejected<P::Error>> {
    offer.check_schema()?;
    require_material(projection, &offer.material_id)?;
    Ok(Validated::new(offer))
}

pub fn validate_match<P: Projection>(
    projection: &P,
    candidate: Match,
) -> Result<Validated<Match>, Rejected<P::Error>> {
    candidate.check_schema()?;
    require_material(projection, &candidate.material_id)?;

    let offer = projection
        .offer(&candidate.offer_id)
        .map_err(Rejected::Projection)?
        .ok_or_else(|| IntegrityViolation::UnknownOffer(candidate.offer_id.clone()))?;

    if offer.material_id != candidate.material_id {
        return Err(IntegrityViolation::OfferMaterialMismatch {
            offer_id: offer.id,
            expected: candidate.material_id,
            found: offer.material_id,
        }
        .into());
    }

    Ok(Validated::new(candidate))
}

pub fn validate_transfer<P: Projection>(
    projection: &P,
    transfer: Transfer,
) -> Result<Validated<Transfer>, Rejected<P::Error>> {
    transfer.check_schema()?;
    require_material(projection, &transfer.material_id)?;

    let matched = projection
        .match_ref(&transfer.match_id)
        .map_err(Rejected::Projection)?
        .ok_or_else(|| IntegrityViolation::UnknownMatch(transfer.match_id.clone()))?;

    if matched.material_id != transfer.material_id {
        return Err(IntegrityViolation::MatchMaterialMismatch {
            match_id: matched.id,
            expected: transfer.material_id,
            found: matched.material_id,
        }
        .into());
    }

    Ok(Validated::new(transfer))
}

fn require_material<P: Projection>(projection: &P, id: &str) -> Result<MaterialRef, Rejected<P::Error>> {
    projection
        .material(id)
        .map_err(Rejected::Projection)?
        .ok_or_else(|| IntegrityViolation::UnknownMaterial(id.to_string()).into())
}
