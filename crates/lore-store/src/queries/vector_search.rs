//! Brute-force cosine similarity over stored embeddings.
//!
//! Corpora here are thousands of chunks, not millions; a linear scan
//! with an early dimension filter beats maintaining an ANN index.

use rusqlite::{params, Connection};

use lore_core::errors::LoreResult;

use super::blob_to_embedding;
use crate::to_store_err;

/// Top-k most similar chunk ids for a query embedding, best first.
/// Equal scores are broken by chunk id ascending, so results are
/// deterministic across runs.
pub fn vector_search(
    conn: &Connection,
    kb: &str,
    query: &[f32],
    top_k: usize,
) -> LoreResult<Vec<(String, f64)>> {
    if top_k == 0 {
        return Ok(Vec::new());
    }
    let query_norm = norm(query);
    if query_norm == 0.0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare_cached("SELECT chunk_id, embedding, dims FROM chunk_vectors WHERE kb = ?1")
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![kb], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut scored: Vec<(String, f64)> = Vec::new();
    for row in rows {
        let (chunk_id, blob, dims) = row.map_err(|e| to_store_err(e.to_string()))?;
        if dims as usize != query.len() {
            // Stored under a different embedding model; not comparable.
            continue;
        }
        let embedding = blob_to_embedding(&blob)?;
        let score = cosine(query, query_norm, &embedding);
        scored.push((chunk_id, score));
    }

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(top_k);
    Ok(scored)
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt()
}

fn cosine(query: &[f32], query_norm: f64, candidate: &[f32]) -> f64 {
    let candidate_norm = norm(candidate);
    if candidate_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = query
        .iter()
        .zip(candidate)
        .map(|(a, b)| (*a as f64) * (*b as f64))
        .sum();
    dot / (query_norm * candidate_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::queries::chunk_ops::{ensure_kb, upsert_chunks};
    use lore_core::models::Chunk;

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        ensure_kb(&conn, "kb").unwrap();
        conn
    }

    fn put(conn: &Connection, id: &str, embedding: &[f32]) {
        let chunk = Chunk {
            chunk_id: id.to_string(),
            doc_id: "doc".to_string(),
            text: format!("text for {id}"),
        };
        upsert_chunks(conn, "kb", &[(&chunk, embedding)]).unwrap();
    }

    #[test]
    fn nearest_neighbors_in_order() {
        let conn = seeded_conn();
        put(&conn, "east", &[1.0, 0.0]);
        put(&conn, "north", &[0.0, 1.0]);
        put(&conn, "northeast", &[1.0, 1.0]);

        let hits = vector_search(&conn, "kb", &[1.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["east", "northeast", "north"]);
        assert!((hits[0].1 - 1.0).abs() < 1e-9);
        assert!(hits[2].1.abs() < 1e-9);
    }

    #[test]
    fn ties_break_by_chunk_id() {
        let conn = seeded_conn();
        put(&conn, "b", &[1.0, 0.0]);
        put(&conn, "a", &[2.0, 0.0]); // same direction, same cosine

        let hits = vector_search(&conn, "kb", &[1.0, 0.0], 2).unwrap();
        let ids: Vec<_> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn zero_query_returns_empty() {
        let conn = seeded_conn();
        put(&conn, "a", &[1.0, 0.0]);
        assert!(vector_search(&conn, "kb", &[0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn mismatched_dimensions_are_skipped() {
        let conn = seeded_conn();
        put(&conn, "old-model", &[1.0, 0.0, 0.0]);
        put(&conn, "current", &[1.0, 0.0]);

        let hits = vector_search(&conn, "kb", &[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "current");
    }

    #[test]
    fn top_k_truncates() {
        let conn = seeded_conn();
        for i in 0..10 {
            put(&conn, &format!("c{i}"), &[1.0, i as f32 / 10.0]);
        }
        assert_eq!(vector_search(&conn, "kb", &[1.0, 0.0], 3).unwrap().len(), 3);
    }
}
