//! The lexical index cache: in-memory BM25 indexes keyed by knowledge
//! base, backed by versioned files on disk, kept honest by a corpus
//! fingerprint.
//!
//! A cached index is valid only while its fingerprint matches the live
//! chunk-id list. Any mismatch, unreadable file, or format change is a
//! miss that triggers a rebuild; the cache never serves a stale index.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lore_core::constants::{LEXICAL_CACHE_MAGIC, LEXICAL_CACHE_VERSION};
use lore_core::errors::{LoreResult, RetrievalError};
use lore_core::models::{Chunk, KbId};

use crate::bm25::Bm25Index;

/// Fingerprint of a corpus state: blake3 over the ordered live chunk
/// ids. Two corpora with the same ids in the same order share it.
pub fn corpus_fingerprint(live_ids: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in live_ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\x00");
    }
    hasher.finalize().to_hex().to_string()
}

/// One cached index together with the corpus state it was built from.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub index: Bm25Index,
}

pub struct LexicalIndexCache {
    cache_dir: PathBuf,
    slots: DashMap<String, Arc<Mutex<Option<Arc<CacheEntry>>>>>,
    rebuilds: AtomicU64,
}

impl LexicalIndexCache {
    pub fn new(cache_dir: PathBuf) -> LoreResult<Self> {
        fs::create_dir_all(&cache_dir).map_err(|e| RetrievalError::SearchFailed {
            reason: format!("cannot create lexical cache dir: {e}"),
        })?;
        Ok(Self {
            cache_dir,
            slots: DashMap::new(),
            rebuilds: AtomicU64::new(0),
        })
    }

    /// Return the index for the current corpus state, rebuilding it if
    /// the memory entry and the disk file are both missing or stale.
    /// `load` fetches the full corpus and runs at most once per call;
    /// concurrent callers for the same knowledge base serialize on a
    /// per-kb lock, so one of them rebuilds and the rest get the result.
    pub fn get_or_build(
        &self,
        kb: &KbId,
        live_ids: &[String],
        load: impl FnOnce() -> LoreResult<Vec<Chunk>>,
    ) -> LoreResult<Arc<CacheEntry>> {
        let expected = corpus_fingerprint(live_ids);
        let slot = self
            .slots
            .entry(kb.as_str().to_string())
            .or_default()
            .clone();
        let mut guard = slot.lock().map_err(|e| RetrievalError::SearchFailed {
            reason: format!("lexical cache lock poisoned: {e}"),
        })?;

        if let Some(entry) = guard.as_ref() {
            if entry.fingerprint == expected {
                return Ok(Arc::clone(entry));
            }
            debug!(kb = %kb, "lexical index stale in memory");
        }

        if let Some(entry) = self.load_from_disk(kb, &expected) {
            let entry = Arc::new(entry);
            *guard = Some(Arc::clone(&entry));
            return Ok(entry);
        }

        let chunks = load()?;
        let corpus: Vec<(String, String)> = chunks
            .into_iter()
            .map(|c| (c.chunk_id, c.text))
            .collect();
        let entry = Arc::new(CacheEntry {
            fingerprint: expected,
            index: Bm25Index::build(&corpus),
        });
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        info!(kb = %kb, chunks = entry.index.len(), "rebuilt lexical index");

        self.write_to_disk(kb, &entry);
        *guard = Some(Arc::clone(&entry));
        Ok(entry)
    }

    /// Drop the cached index for a knowledge base, memory and disk.
    /// Called synchronously on every mutation of the corpus.
    pub fn invalidate(&self, kb: &KbId) {
        if let Some(slot) = self.slots.get(kb.as_str()) {
            if let Ok(mut guard) = slot.lock() {
                *guard = None;
            }
        }
        let path = self.index_path(kb);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(kb = %kb, error = %e, "could not remove lexical index file");
            }
        }
        debug!(kb = %kb, "invalidated lexical index");
    }

    /// Number of full index rebuilds this cache has performed.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    fn index_path(&self, kb: &KbId) -> PathBuf {
        self.cache_dir.join(format!("{kb}.bm25"))
    }

    /// A readable file with the right magic, version and fingerprint is
    /// a hit; anything else is a miss. Corruption never propagates.
    fn load_from_disk(&self, kb: &KbId, expected: &str) -> Option<CacheEntry> {
        let path = self.index_path(kb);
        let bytes = fs::read(&path).ok()?;
        if bytes.len() < 8 || bytes[..4] != LEXICAL_CACHE_MAGIC {
            warn!(kb = %kb, "lexical index file has bad magic, discarding");
            return None;
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != LEXICAL_CACHE_VERSION {
            debug!(kb = %kb, version, "lexical index file version mismatch");
            return None;
        }
        let entry: CacheEntry = match bincode::deserialize(&bytes[8..]) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(kb = %kb, error = %e, "lexical index file corrupt, discarding");
                return None;
            }
        };
        if entry.fingerprint != expected {
            debug!(kb = %kb, "lexical index file stale");
            return None;
        }
        Some(entry)
    }

    /// Best effort: a failed write costs a rebuild next restart, not an
    /// error now. Written to a temp file and renamed so readers never
    /// see a half-written index.
    fn write_to_disk(&self, kb: &KbId, entry: &CacheEntry) {
        let payload = match bincode::serialize(entry) {
            Ok(p) => p,
            Err(e) => {
                warn!(kb = %kb, error = %e, "could not serialize lexical index");
                return;
            }
        };
        let mut bytes = Vec::with_capacity(8 + payload.len());
        bytes.extend_from_slice(&LEXICAL_CACHE_MAGIC);
        bytes.extend_from_slice(&LEXICAL_CACHE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);

        let path = self.index_path(kb);
        let tmp = self.cache_dir.join(format!("{kb}.bm25.tmp"));
        let result = fs::write(&tmp, &bytes).and_then(|_| fs::rename(&tmp, &path));
        if let Err(e) = result {
            warn!(kb = %kb, error = %e, "could not persist lexical index");
            let _ = fs::remove_file(&tmp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn kb() -> KbId {
        KbId::new("kb").unwrap()
    }

    fn chunks(docs: &[(&str, &str)]) -> Vec<Chunk> {
        docs.iter()
            .map(|(id, text)| Chunk {
                chunk_id: id.to_string(),
                doc_id: "doc".to_string(),
                text: text.to_string(),
            })
            .collect()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn second_call_hits_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();
        let corpus = chunks(&[("a", "alpha"), ("b", "bravo")]);
        let live = ids(&["a", "b"]);

        let first = cache.get_or_build(&kb(), &live, || Ok(corpus.clone())).unwrap();
        let second = cache.get_or_build(&kb(), &live, || panic!("must not reload")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn fingerprint_change_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();

        cache
            .get_or_build(&kb(), &ids(&["a"]), || Ok(chunks(&[("a", "alpha")])))
            .unwrap();
        let rebuilt = cache
            .get_or_build(&kb(), &ids(&["a", "b"]), || {
                Ok(chunks(&[("a", "alpha"), ("b", "bravo")]))
            })
            .unwrap();
        assert_eq!(cache.rebuild_count(), 2);
        assert_eq!(rebuilt.index.len(), 2);
    }

    #[test]
    fn disk_file_survives_cache_restart() {
        let dir = tempfile::tempdir().unwrap();
        let live = ids(&["a", "b"]);
        {
            let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();
            cache
                .get_or_build(&kb(), &live, || Ok(chunks(&[("a", "alpha"), ("b", "bravo")])))
                .unwrap();
            assert_eq!(cache.rebuild_count(), 1);
        }

        let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();
        let entry = cache
            .get_or_build(&kb(), &live, || panic!("disk hit expected"))
            .unwrap();
        assert_eq!(cache.rebuild_count(), 0);
        assert_eq!(entry.index.len(), 2);
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("kb.bm25"), b"LOREgarbage that is not bincode").unwrap();

        let entry = cache
            .get_or_build(&kb(), &ids(&["a"]), || Ok(chunks(&[("a", "alpha")])))
            .unwrap();
        assert_eq!(cache.rebuild_count(), 1);
        assert_eq!(entry.index.len(), 1);
    }

    #[test]
    fn wrong_magic_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("kb.bm25"), b"XXXX\x01\x00\x00\x00rest").unwrap();

        cache
            .get_or_build(&kb(), &ids(&["a"]), || Ok(chunks(&[("a", "alpha")])))
            .unwrap();
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn invalidate_clears_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LexicalIndexCache::new(dir.path().to_path_buf()).unwrap();
        let live = ids(&["a"]);
        cache
            .get_or_build(&kb(), &live, || Ok(chunks(&[("a", "alpha")])))
            .unwrap();
        assert!(dir.path().join("kb.bm25").exists());

        cache.invalidate(&kb());
        assert!(!dir.path().join("kb.bm25").exists());

        cache
            .get_or_build(&kb(), &live, || Ok(chunks(&[("a", "alpha")])))
            .unwrap();
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[test]
    fn concurrent_misses_rebuild_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(LexicalIndexCache::new(dir.path().to_path_buf()).unwrap());
        let loads = Arc::new(AtomicU32::new(0));
        let live = ids(&["a", "b"]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            let live = live.clone();
            handles.push(std::thread::spawn(move || {
                cache
                    .get_or_build(&KbId::new("kb").unwrap(), &live, || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(chunks(&[("a", "alpha"), ("b", "bravo")]))
                    })
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        assert_ne!(
            corpus_fingerprint(&ids(&["a", "b"])),
            corpus_fingerprint(&ids(&["b", "a"]))
        );
        assert_eq!(
            corpus_fingerprint(&ids(&["a", "b"])),
            corpus_fingerprint(&ids(&["a", "b"]))
        );
    }
}
