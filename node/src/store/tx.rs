// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Write transaction over the projection and the ledger.

use loop_kernel::event::format_timestamp;
use loop_kernel::types::{EventId, LoopEntity, Match, MatchRef, Material, MaterialRef, Offer, OfferRef, Transfer};
use loop_kernel::{EventDraft, Projection, Validated};
use rusqlite::{params, Connection, Transaction};

use super::{match_ref, material_ref, now, offer_ref, Appended, Created, Result, StoreError};

pub struct StoreTx<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> StoreTx<'conn> {
    pub(super) fn begin(conn: &'conn mut Connection) -> Result<Self> {
        Ok(Self { tx: conn.transaction()? })
    }

    pub(super) fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn create_material(&self, material: &Validated<Material>) -> Result<Created> {
        let created_at = now();
        self.insert(
            "material",
            material.id(),
            "INSERT INTO loop_materials
                (id, category, quantity_value, quantity_unit, origin_city, current_city,
                 available_from, expires_at, quality, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                material.id(),
                material.category,
                material.quantity.value,
                material.quantity.unit,
                material.origin_city,
                material.current_city,
                material.available_from,
                material.expires,
                material.quality,
                encode(material.get())?,
                format_timestamp(&created_at)
            ],
        )?;
        Ok(Created { id: material.id.clone(), created_at })
    }

    pub fn create_offer(&self, offer: &Validated<Offer>) -> Result<Created> {
        let created_at = now();
        self.insert(
            "offer",
            offer.id(),
            "INSERT INTO loop_offers
                (id, material_id, from_city, to_city, status, quantity_value, quantity_unit,
                 available_until, terms, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                offer.id(),
                offer.material_id,
                offer.from_city,
                offer.to_city,
                offer.status,
                offer.quantity.value,
                offer.quantity.unit,
                offer.available_until,
                offer.terms,
                encode(offer.get())?,
                format_timestamp(&created_at)
            ],
        )?;
        Ok(Created { id: offer.id.clone(), created_at })
    }

    pub fn create_match(&self, candidate: &Validated<Match>) -> Result<Created> {
        let created_at = now();
        self.insert(
            "match",
            candidate.id(),
            "INSERT INTO loop_matches
                (id, material_id, offer_id, from_city, to_city, status, matched_at, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                candidate.id(),
                candidate.material_id,
                candidate.offer_id,
                candidate.from_city,
                candidate.to_city,
                candidate.status,
                candidate.matched_at,
                encode(candidate.get())?,
                format_timestamp(&created_at)
            ],
        )?;
        Ok(Created { id: candidate.id.clone(), created_at })
    }

    pub fn create_transfer(&self, transfer: &Validated<Transfer>) -> Result<Created> {
        let created_at = now();
        self.insert(
            "transfer",
            transfer.id(),
            "INSERT INTO loop_transfers
                (id, material_id, match_id, status, handoff_at, received_at, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                transfer.id(),
                transfer.material_id,
                transfer.match_id,
                transfer.status,
                transfer.handoff_at,
                transfer.received_at,
                encode(transfer.get())?,
                format_timestamp(&created_at)
            ],
        )?;
        Ok(Created { id: transfer.id.clone(), created_at })
    }

    /// Append to the ledger. The id comes from the store.
    pub fn append_event(&self, draft: &EventDraft) -> Result<Appended> {
        let created_at = now();
        let payload = serde_json::to_string(&draft.payload)
            .map_err(|e| StoreError::Corrupt(format!("event payload: {}", e)))?;
        self.tx
            .prepare_cached(
                "INSERT INTO loop_events (event_type, entity_type, entity_id, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                draft.event_type,
                draft.entity_type,
                draft.entity_id,
                payload,
                format_timestamp(&created_at)
            ])?;
        Ok(Appended {
            id: EventId(self.tx.last_insert_rowid()),
            created_at,
        })
    }

    fn insert(
        &self,
        entity: &'static str,
        id: &str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<()> {
        match self.tx.prepare_cached(sql)?.execute(params) {
            Ok(_) => Ok(()),
            Err(e) if is_primary_key_violation(&e) => Err(StoreError::Conflict {
                entity,
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Projection for StoreTx<'_> {
    type Error = StoreError;

    fn material(&self, id: &str) -> Result<Option<MaterialRef>> {
        material_ref(&self.tx, id)
    }

    fn offer(&self, id: &str) -> Result<Option<OfferRef>> {
        offer_ref(&self.tx, id)
    }

    fn match_ref(&self, id: &str) -> Result<Option<MatchRef>> {
        match_ref(&self.tx, id)
    }
}

fn encode<T: LoopEntity>(entity: &T) -> Result<String> {
    serde_json::to_string(entity).map_err(|e| StoreError::Corrupt(format!("{} payload: {}", T::KIND, e)))
}

fn is_primary_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
