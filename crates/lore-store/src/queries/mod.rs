//! Raw SQL operations. Every function takes a `&Connection` borrowed
//! from the write connection; callers own transaction scoping.

pub mod chunk_ops;
pub mod vector_search;

use lore_core::errors::LoreResult;

use crate::to_store_err;

/// Serialize an embedding as little-endian f32 bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Deserialize little-endian f32 bytes back into an embedding.
pub fn blob_to_embedding(blob: &[u8]) -> LoreResult<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(to_store_err(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
