//! Schema migrations gated on `PRAGMA user_version`.

use rusqlite::Connection;

use lore_core::errors::{LoreResult, StoreError};

use crate::to_store_err;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Run all outstanding migrations.
pub fn run_migrations(conn: &Connection) -> LoreResult<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| to_store_err(e.to_string()))?;

    if version < 1 {
        migrate_v1(conn).map_err(|e| StoreError::MigrationFailed {
            version: 1,
            reason: e.to_string(),
        })?;
        conn.pragma_update(None, "user_version", 1)
            .map_err(|e| to_store_err(e.to_string()))?;
    }

    Ok(())
}

/// v1: knowledge_bases, chunk_vectors, chunk_meta.
fn migrate_v1(conn: &Connection) -> LoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS knowledge_bases (
            name        TEXT PRIMARY KEY,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS chunk_vectors (
            kb          TEXT NOT NULL,
            chunk_id    TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            dims        INTEGER NOT NULL,
            PRIMARY KEY (kb, chunk_id)
        );

        CREATE TABLE IF NOT EXISTS chunk_meta (
            kb          TEXT NOT NULL,
            chunk_id    TEXT NOT NULL,
            doc_id      TEXT NOT NULL,
            text        TEXT NOT NULL,
            byte_len    INTEGER NOT NULL,
            ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (kb, chunk_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chunk_meta_doc ON chunk_meta(kb, doc_id);
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
