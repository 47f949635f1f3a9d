// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! SQLite schema and migrations.
//!
//! Versioned through `PRAGMA user_version`. Migrations only ever add.

use rusqlite::Connection;

use super::StoreError;

pub const SCHEMA_VERSION: i64 = 1;

const V1: &str = r#"
CREATE TABLE IF NOT EXISTS loop_materials (
    id              TEXT PRIMARY KEY,
    category        TEXT NOT NULL,
    quantity_value  REAL NOT NULL,
    quantity_unit   TEXT NOT NULL,
    origin_city     TEXT NOT NULL,
    current_city    TEXT NOT NULL,
    available_from  TEXT NOT NULL,
    expires_at      TEXT,
    quality         REAL,
    payload         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS loop_offers (
    id               TEXT PRIMARY KEY,
    material_id      TEXT NOT NULL REFERENCES loop_materials(id),
    from_city        TEXT NOT NULL,
    to_city          TEXT NOT NULL,
    status           TEXT NOT NULL,
    quantity_value   REAL NOT NULL,
    quantity_unit    TEXT NOT NULL,
    available_until  TEXT NOT NULL,
    terms            TEXT,
    payload          TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS loop_matches (
    id           TEXT PRIMARY KEY,
    material_id  TEXT NOT NULL REFERENCES loop_materials(id),
    offer_id     TEXT NOT NULL REFERENCES loop_offers(id),
    from_city    TEXT NOT NULL,
    to_city      TEXT NOT NULL,
    status       TEXT NOT NULL,
    matched_at   TEXT NOT NULL,
    payload      TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS loop_transfers (
    id           TEXT PRIMARY KEY,
    material_id  TEXT NOT NULL REFERENCES loop_materials(id),
    match_id     TEXT NOT NULL REFERENCES loop_matches(id),
    status       TEXT NOT NULL,
    handoff_at   TEXT NOT NULL,
    received_at  TEXT,
    payload      TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS loop_events (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type   TEXT NOT NULL,
    entity_type  TEXT NOT NULL,
    entity_id    TEXT NOT NULL,
    payload      TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS loop_events_entity ON loop_events(entity_type, entity_id);

CREATE TRIGGER IF NOT EXISTS loop_events_no_update
BEFORE UPDATE ON loop_events
BEGIN
    SELECT RAISE(ABORT, 'loop_events is append-only');
END;

CREATE TRIGGER IF NOT EXISTS loop_events_no_delete
BEFORE DELETE ON loop_events
BEGIN
    SELECT RAISE(ABORT, 'loop_events is append-only');
END;
"#;

pub fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let current: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(StoreError::from)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }
    if current == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    if current < 1 {
        tx.execute_batch(V1)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    tracing::info!("Store schema migrated from v{} to v{}", current, SCHEMA_VERSION);
    Ok(())
}
