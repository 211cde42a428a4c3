//! In-memory BM25 index over the chunks of one knowledge base.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tokenize::tokenize;

/// Okapi BM25 index. Built once per corpus state, queried many times.
/// Serializable so the lexical cache can persist it across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    /// Chunk ids, index position = internal doc number.
    chunk_ids: Vec<String>,
    /// Token count per chunk.
    doc_lens: Vec<u32>,
    avg_doc_len: f64,
    /// term -> (doc number, term frequency) postings.
    postings: HashMap<String, Vec<(u32, u32)>>,
}

impl Bm25Index {
    /// Tokenize and index a corpus of (chunk id, text) pairs.
    pub fn build(corpus: &[(String, String)]) -> Self {
        let mut chunk_ids = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();

        for (doc_no, (chunk_id, text)) in corpus.iter().enumerate() {
            let tokens = tokenize(text);
            doc_lens.push(tokens.len() as u32);
            chunk_ids.push(chunk_id.clone());

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for (term, count) in tf {
                postings.entry(term).or_default().push((doc_no as u32, count));
            }
        }

        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().map(|l| *l as f64).sum::<f64>() / doc_lens.len() as f64
        };

        Self {
            chunk_ids,
            doc_lens,
            avg_doc_len,
            postings,
        }
    }

    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    /// Top-k chunk ids for a query, best first. Only chunks with a
    /// positive BM25 score appear; equal scores break by chunk id
    /// ascending so rankings are deterministic.
    pub fn search(&self, query: &str, top_k: usize, k1: f64, b: f64) -> Vec<(String, f64)> {
        if top_k == 0 || self.is_empty() {
            return Vec::new();
        }
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let n = self.chunk_ids.len() as f64;
        let mut scores: HashMap<u32, f64> = HashMap::new();

        for term in &terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let df = posting.len() as f64;
            // Okapi idf; +1 inside the log keeps common terms non-negative.
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(doc_no, tf) in posting {
                let tf = tf as f64;
                let doc_len = self.doc_lens[doc_no as usize] as f64;
                let norm = k1 * (1.0 - b + b * doc_len / self.avg_doc_len);
                let contribution = idf * (tf * (k1 + 1.0)) / (tf + norm);
                *scores.entry(doc_no).or_insert(0.0) += contribution;
            }
        }

        let mut ranked: Vec<(String, f64)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc_no, score)| (self.chunk_ids[doc_no as usize].clone(), score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::constants::{DEFAULT_BM25_B, DEFAULT_BM25_K1};

    fn corpus(docs: &[(&str, &str)]) -> Vec<(String, String)> {
        docs.iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect()
    }

    fn search(index: &Bm25Index, query: &str, top_k: usize) -> Vec<String> {
        index
            .search(query, top_k, DEFAULT_BM25_K1, DEFAULT_BM25_B)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn rare_terms_outrank_common_ones() {
        let index = Bm25Index::build(&corpus(&[
            ("a", "the cat sat on the mat"),
            ("b", "the dog sat on the log"),
            ("c", "quantum entanglement in the lab"),
        ]));
        assert_eq!(search(&index, "quantum lab", 3), vec!["c"]);
    }

    #[test]
    fn zero_score_chunks_are_excluded() {
        let index = Bm25Index::build(&corpus(&[("a", "alpha bravo"), ("b", "charlie delta")]));
        let hits = search(&index, "alpha", 10);
        assert_eq!(hits, vec!["a"]);
    }

    #[test]
    fn unknown_terms_return_empty() {
        let index = Bm25Index::build(&corpus(&[("a", "alpha bravo")]));
        assert!(search(&index, "zulu", 10).is_empty());
    }

    #[test]
    fn term_frequency_breaks_symmetric_docs() {
        let index = Bm25Index::build(&corpus(&[
            ("once", "retrieval and other topics and filler words here"),
            ("twice", "retrieval retrieval and some other filler here now"),
        ]));
        assert_eq!(search(&index, "retrieval", 2)[0], "twice");
    }

    #[test]
    fn ties_break_by_chunk_id() {
        let index = Bm25Index::build(&corpus(&[("b", "same text"), ("a", "same text")]));
        assert_eq!(search(&index, "same", 2), vec!["a", "b"]);
    }

    #[test]
    fn cjk_queries_match_per_ideograph() {
        let index = Bm25Index::build(&corpus(&[
            ("ml", "机器学习是人工智能的分支"),
            ("db", "数据库索引优化"),
        ]));
        assert_eq!(search(&index, "机器学习", 2)[0], "ml");
    }

    #[test]
    fn empty_corpus_and_empty_query() {
        let empty = Bm25Index::build(&[]);
        assert!(empty.search("anything", 5, DEFAULT_BM25_K1, DEFAULT_BM25_B).is_empty());

        let index = Bm25Index::build(&corpus(&[("a", "alpha")]));
        assert!(index.search("  ", 5, DEFAULT_BM25_K1, DEFAULT_BM25_B).is_empty());
    }
}
