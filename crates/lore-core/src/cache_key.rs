//! Query cache-key derivation for the chat/orchestration layer.
//!
//! The core owns no result cache; it only exposes this pure, hash-stable
//! derivation so outer layers can de-duplicate repeated queries.

use crate::models::KbId;

/// Derive a fixed-length cache key from a knowledge base and a query.
///
/// The query is trimmed and lowercased before hashing, so trivially
/// different spellings of the same question share a key. The kb id is
/// mixed in with a separator that cannot occur in either component.
pub fn cache_key(kb: &KbId, query: &str) -> String {
    let normalized = query.trim().to_lowercase();
    let mut hasher = blake3::Hasher::new();
    hasher.update(kb.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(normalized.as_bytes());
    hasher.finalize().to_hex().to_string()
}
