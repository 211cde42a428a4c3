//! Chunk and knowledge-base row operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use lore_core::errors::{LoreResult, StoreError};
use lore_core::models::{Chunk, DocumentMeta};

use super::embedding_to_blob;
use crate::to_store_err;

/// Document id assigned to metadata rows reconstructed during repair,
/// when the original document can no longer be determined.
pub const RECOVERED_DOC_ID: &str = "__recovered__";

pub fn kb_exists(conn: &Connection, kb: &str) -> LoreResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM knowledge_bases WHERE name = ?1",
            params![kb],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    Ok(found.is_some())
}

/// Create the knowledge-base row if absent. Returns true when created.
pub fn ensure_kb(conn: &Connection, kb: &str) -> LoreResult<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO knowledge_bases (name, created_at) VALUES (?1, ?2)",
            params![kb, Utc::now().to_rfc3339()],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    Ok(inserted > 0)
}

/// Drop the knowledge base and every chunk it holds.
pub fn delete_kb(conn: &Connection, kb: &str) -> LoreResult<()> {
    if !kb_exists(conn, kb)? {
        return Err(StoreError::UnknownKnowledgeBase { kb: kb.to_string() }.into());
    }
    conn.execute_batch("SAVEPOINT drop_kb")
        .map_err(|e| to_store_err(e.to_string()))?;
    let result = (|| -> LoreResult<()> {
        conn.execute("DELETE FROM chunk_vectors WHERE kb = ?1", params![kb])
            .map_err(|e| to_store_err(e.to_string()))?;
        conn.execute("DELETE FROM chunk_meta WHERE kb = ?1", params![kb])
            .map_err(|e| to_store_err(e.to_string()))?;
        conn.execute("DELETE FROM knowledge_bases WHERE name = ?1", params![kb])
            .map_err(|e| to_store_err(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute_batch("RELEASE drop_kb")
                .map_err(|e| to_store_err(e.to_string()))?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK TO drop_kb; RELEASE drop_kb");
            Err(e)
        }
    }
}

pub fn list_kbs(conn: &Connection) -> LoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM knowledge_bases ORDER BY name")
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_store_err(e.to_string()))
}

/// Write a batch of chunks and their embeddings atomically. Any failure
/// rolls the whole batch back; both tables see all rows or none.
pub fn upsert_chunks(
    conn: &Connection,
    kb: &str,
    rows: &[(&Chunk, &[f32])],
) -> LoreResult<usize> {
    conn.execute_batch("SAVEPOINT upsert_chunks")
        .map_err(|e| to_store_err(e.to_string()))?;

    let result = write_chunk_rows(conn, kb, rows);

    match result {
        Ok(count) => {
            conn.execute_batch("RELEASE upsert_chunks")
                .map_err(|e| to_store_err(e.to_string()))?;
            Ok(count)
        }
        Err(e) => {
            // Best effort; the savepoint dies with the connection anyway.
            let _ = conn.execute_batch("ROLLBACK TO upsert_chunks; RELEASE upsert_chunks");
            Err(StoreError::PartialWrite {
                kb: kb.to_string(),
                reason: e.to_string(),
            }
            .into())
        }
    }
}

fn write_chunk_rows(conn: &Connection, kb: &str, rows: &[(&Chunk, &[f32])]) -> LoreResult<usize> {
    let now = Utc::now().to_rfc3339();
    let mut vec_stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO chunk_vectors (kb, chunk_id, embedding, dims)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    let mut meta_stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO chunk_meta (kb, chunk_id, doc_id, text, byte_len, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    for (chunk, embedding) in rows {
        vec_stmt
            .execute(params![
                kb,
                chunk.chunk_id,
                embedding_to_blob(embedding),
                embedding.len() as i64,
            ])
            .map_err(|e| to_store_err(e.to_string()))?;
        meta_stmt
            .execute(params![
                kb,
                chunk.chunk_id,
                chunk.doc_id,
                chunk.text,
                chunk.text.len() as i64,
                now,
            ])
            .map_err(|e| to_store_err(e.to_string()))?;
    }
    Ok(rows.len())
}

/// Remove every chunk of one document from both tables atomically.
/// Returns the number of distinct chunk ids removed.
pub fn delete_document(conn: &Connection, kb: &str, doc_id: &str) -> LoreResult<usize> {
    let mut stmt = conn
        .prepare("SELECT chunk_id FROM chunk_meta WHERE kb = ?1 AND doc_id = ?2")
        .map_err(|e| to_store_err(e.to_string()))?;
    let ids: Vec<String> = stmt
        .query_map(params![kb, doc_id], |row| row.get(0))
        .map_err(|e| to_store_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_store_err(e.to_string()))?;

    if ids.is_empty() {
        return Ok(0);
    }

    conn.execute_batch("SAVEPOINT drop_doc")
        .map_err(|e| to_store_err(e.to_string()))?;
    let result = (|| -> LoreResult<()> {
        for chunk_id in &ids {
            conn.execute(
                "DELETE FROM chunk_vectors WHERE kb = ?1 AND chunk_id = ?2",
                params![kb, chunk_id],
            )
            .map_err(|e| to_store_err(e.to_string()))?;
            conn.execute(
                "DELETE FROM chunk_meta WHERE kb = ?1 AND chunk_id = ?2",
                params![kb, chunk_id],
            )
            .map_err(|e| to_store_err(e.to_string()))?;
        }
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute_batch("RELEASE drop_doc")
                .map_err(|e| to_store_err(e.to_string()))?;
            Ok(ids.len())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK TO drop_doc; RELEASE drop_doc");
            Err(e)
        }
    }
}

/// Chunk ids present in the metadata store, ascending.
pub fn meta_chunk_ids(conn: &Connection, kb: &str) -> LoreResult<Vec<String>> {
    ordered_ids(conn, kb, "chunk_meta")
}

/// Chunk ids present in the vector store, ascending.
pub fn vector_chunk_ids(conn: &Connection, kb: &str) -> LoreResult<Vec<String>> {
    ordered_ids(conn, kb, "chunk_vectors")
}

fn ordered_ids(conn: &Connection, kb: &str, table: &str) -> LoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT chunk_id FROM {table} WHERE kb = ?1 ORDER BY chunk_id"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![kb], |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_store_err(e.to_string()))
}

/// Resolve chunk ids to full chunks, preserving the input order.
/// Ids with no metadata row are skipped.
pub fn chunks_by_ids(conn: &Connection, kb: &str, ids: &[String]) -> LoreResult<Vec<Chunk>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT doc_id, text FROM chunk_meta WHERE kb = ?1 AND chunk_id = ?2",
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut out = Vec::with_capacity(ids.len());
    for chunk_id in ids {
        let row: Option<(String, String)> = stmt
            .query_row(params![kb, chunk_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()
            .map_err(|e| to_store_err(e.to_string()))?;
        if let Some((doc_id, text)) = row {
            out.push(Chunk {
                chunk_id: chunk_id.clone(),
                doc_id,
                text,
            });
        }
    }
    Ok(out)
}

/// Documents in a knowledge base with aggregate chunk sizes.
pub fn list_documents(conn: &Connection, kb: &str) -> LoreResult<Vec<DocumentMeta>> {
    let mut stmt = conn
        .prepare(
            "SELECT doc_id, SUM(byte_len), MIN(ingested_at)
             FROM chunk_meta WHERE kb = ?1
             GROUP BY doc_id ORDER BY doc_id",
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![kb], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut docs = Vec::new();
    for row in rows {
        let (doc_id, byte_len, ingested_at) = row.map_err(|e| to_store_err(e.to_string()))?;
        let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        docs.push(DocumentMeta {
            doc_id,
            byte_len: byte_len as u64,
            ingested_at,
        });
    }
    Ok(docs)
}

/// Insert a metadata row reconstructed during repair.
pub fn insert_recovered_meta(conn: &Connection, kb: &str, chunk_id: &str) -> LoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO chunk_meta (kb, chunk_id, doc_id, text, byte_len, ingested_at)
         VALUES (?1, ?2, ?3, '', 0, ?4)",
        params![kb, chunk_id, RECOVERED_DOC_ID, Utc::now().to_rfc3339()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Insert a vector row re-embedded during repair.
pub fn insert_vector(
    conn: &Connection,
    kb: &str,
    chunk_id: &str,
    embedding: &[f32],
) -> LoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO chunk_vectors (kb, chunk_id, embedding, dims)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            kb,
            chunk_id,
            embedding_to_blob(embedding),
            embedding.len() as i64
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Text of one chunk, if its metadata row exists.
pub fn chunk_text(conn: &Connection, kb: &str, chunk_id: &str) -> LoreResult<Option<String>> {
    conn.query_row(
        "SELECT text FROM chunk_meta WHERE kb = ?1 AND chunk_id = ?2",
        params![kb, chunk_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))
}
