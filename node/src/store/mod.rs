// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Entity Store
//!
//! Durable relational storage for the lifecycle projection (materials,
//! offers, matches, transfers) and the append-only event ledger, on SQLite.
//!
//! # Guarantees
//! - Entity rows and their ledger event commit in one transaction
//! - Ledger ids come from `AUTOINCREMENT`, never from callers
//! - `loop_events` rejects UPDATE and DELETE at the database level
//! - Offer/Match/Transfer inserts require a `Validated<T>`

pub mod schema;
pub mod tx;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use loop_kernel::types::{EventId, MatchRef, MaterialRef, OfferRef};
use loop_kernel::{LedgerEvent, Projection};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use thiserror::Error;

pub use tx::StoreTx;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),

    #[error("duplicate {entity} id: {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
                | ErrorCode::OutOfMemory => StoreError::Unavailable(e.to_string()),
                ErrorCode::ConstraintViolation => StoreError::Constraint(e.to_string()),
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    StoreError::Corrupt(e.to_string())
                }
                _ => StoreError::Sqlite(e),
            },
            _ => StoreError::Sqlite(e),
        }
    }
}

/// Identity and timestamp of a freshly created entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger position and timestamp of a freshly appended event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub id: EventId,
    pub created_at: DateTime<Utc>,
}

/// Server-assigned timestamp, truncated to what the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub struct LoopStore {
    conn: Connection,
}

impl LoopStore {
    /// Open (or create) a file-backed store and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!("SQLite refused WAL mode, running with journal_mode={}", mode);
        }
        conn.pragma_update(None, "synchronous", "FULL")?;
        tracing::info!("Store opened at {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Run `f` inside one transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn write<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let tx = StoreTx::begin(&mut self.conn)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn get_material(&self, id: &str) -> Result<Option<MaterialRef>> {
        material_ref(&self.conn, id)
    }

    pub fn get_offer(&self, id: &str) -> Result<Option<OfferRef>> {
        offer_ref(&self.conn, id)
    }

    pub fn get_match(&self, id: &str) -> Result<Option<MatchRef>> {
        match_ref(&self.conn, id)
    }

    /// Newest first.
    pub fn list_events(&self, limit: usize) -> Result<Vec<LedgerEvent>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, event_type, entity_type, entity_id, payload, created_at
             FROM loop_events
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, event_type, entity_type, entity_id, payload, created_at) = row?;
            events.push(LedgerEvent {
                id: EventId(id),
                event_type,
                entity_type,
                entity_id,
                payload: serde_json::from_str(&payload)
                    .map_err(|e| StoreError::Corrupt(format!("event {} payload: {}", id, e)))?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(events)
    }

    pub fn event_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM loop_events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Projection for LoopStore {
    type Error = StoreError;

    fn material(&self, id: &str) -> Result<Option<MaterialRef>> {
        self.get_material(id)
    }

    fn offer(&self, id: &str) -> Result<Option<OfferRef>> {
        self.get_offer(id)
    }

    fn match_ref(&self, id: &str) -> Result<Option<MatchRef>> {
        self.get_match(id)
    }
}

pub(crate) fn material_ref(conn: &Connection, id: &str) -> Result<Option<MaterialRef>> {
    let row = conn
        .prepare_cached("SELECT id FROM loop_materials WHERE id = ?1")?
        .query_row(params![id], |row| Ok(MaterialRef { id: row.get(0)? }))
        .optional()?;
    Ok(row)
}

pub(crate) fn offer_ref(conn: &Connection, id: &str) -> Result<Option<OfferRef>> {
    let row = conn
        .prepare_cached("SELECT id, material_id FROM loop_offers WHERE id = ?1")?
        .query_row(params![id], |row| {
            Ok(OfferRef {
                id: row.get(0)?,
                material_id: row.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub(crate) fn match_ref(conn: &Connection, id: &str) -> Result<Option<MatchRef>> {
    let row = conn
        .prepare_cached("SELECT id, material_id, offer_id FROM loop_matches WHERE id = ?1")?
        .query_row(params![id], |row| {
            Ok(MatchRef {
                id: row.get(0)?,
                material_id: row.get(1)?,
                offer_id: row.get(2)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loop_kernel::integrity::{validate_match, validate_material, validate_offer};
    use loop_kernel::EventDraft;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::testing::{material, match_for, offer};

    fn seed(store: &mut LoopStore) {
        store
            .write(|tx| {
                let m = validate_material::<StoreError>(material("M1"))?;
                tx.create_material(&m)?;
                let o = validate_offer(tx, offer("O1", "M1"))?;
                tx.create_offer(&o)?;
                Ok::<_, crate::errors::LoopError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_projection_reads() {
        let mut store = LoopStore::open_in_memory().unwrap();
        seed(&mut store);

        assert_eq!(store.get_material("M1").unwrap().unwrap().id, "M1");
        assert!(store.get_material("M2").unwrap().is_none());
        assert_eq!(store.get_offer("O1").unwrap().unwrap().material_id, "M1");
        assert!(store.get_match("X1").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_is_conflict() {
        let mut store = LoopStore::open_in_memory().unwrap();
        seed(&mut store);

        let err = store
            .write(|tx| {
                let m = validate_material::<StoreError>(material("M1"))
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                tx.create_material(&m)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "material", .. }));
    }

    #[test]
    fn test_failed_write_rolls_back_entity() {
        let mut store = LoopStore::open_in_memory().unwrap();
        seed(&mut store);

        let res: std::result::Result<(), StoreError> = store.write(|tx| {
            let x = validate_match(tx, match_for("X1", "M1", "O1")).map_err(|e| {
                StoreError::Corrupt(e.to_string())
            })?;
            tx.create_match(&x)?;
            Err(StoreError::Unavailable("simulated crash before event append".into()))
        });
        assert!(res.is_err());
        assert!(store.get_match("X1").unwrap().is_none());
        assert_eq!(store.event_count().unwrap(), 0);
    }

    #[test]
    fn test_append_and_list_round_trip() {
        let mut store = LoopStore::open_in_memory().unwrap();
        let payload = json!({ "note": "ünïcode", "nested": { "n": 1.25, "list": [1, 2, 3] } });

        let first = store
            .write(|tx| {
                tx.append_event(&EventDraft {
                    event_type: "material.created".into(),
                    entity_type: "material".into(),
                    entity_id: "M1".into(),
                    payload: payload.clone(),
                })
            })
            .unwrap();
        let second = store
            .write(|tx| {
                tx.append_event(&EventDraft {
                    event_type: "offer.created".into(),
                    entity_type: "offer".into(),
                    entity_id: "O1".into(),
                    payload: json!({}),
                })
            })
            .unwrap();
        assert!(second.id > first.id);

        let events = store.list_events(50).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, second.id);
        assert_eq!(events[1].event_type, "material.created");
        assert_eq!(events[1].entity_id, "M1");
        assert_eq!(events[1].payload, payload);
        assert_eq!(events[1].created_at, first.created_at);

        assert_eq!(store.list_events(1).unwrap().len(), 1);
    }

    #[test]
    fn test_ledger_is_append_only() {
        let mut store = LoopStore::open_in_memory().unwrap();
        store
            .write(|tx| {
                tx.append_event(&EventDraft {
                    event_type: "material.created".into(),
                    entity_type: "material".into(),
                    entity_id: "M1".into(),
                    payload: json!({}),
                })
            })
            .unwrap();

        assert!(store.conn.execute("UPDATE loop_events SET entity_id = 'M2'", []).is_err());
        assert!(store.conn.execute("DELETE FROM loop_events", []).is_err());
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loop.db");

        {
            let mut store = LoopStore::open(&path).unwrap();
            seed(&mut store);
        }

        let store = LoopStore::open(&path).unwrap();
        assert!(store.get_offer("O1").unwrap().is_some());
    }
}
