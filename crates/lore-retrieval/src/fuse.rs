//! Reciprocal Rank Fusion of the vector and lexical rankings.

/// Fuse two rankings of chunk ids into one.
///
/// A chunk at 1-based rank `r` in a ranking contributes
/// `weight / (k + r)`; a chunk absent from one ranking simply gets no
/// contribution from it. Output is sorted by fused score descending,
/// ties broken by chunk id ascending.
pub fn rrf_fuse(
    vector_ranking: &[String],
    lexical_ranking: &[String],
    k: u32,
    vector_weight: f64,
    lexical_weight: f64,
) -> Vec<(String, f64)> {
    let mut scores: Vec<(String, f64)> = Vec::new();

    let mut add = |ranking: &[String], weight: f64| {
        for (i, chunk_id) in ranking.iter().enumerate() {
            let contribution = weight / (k as f64 + (i + 1) as f64);
            match scores.iter_mut().find(|(id, _)| id == chunk_id) {
                Some((_, score)) => *score += contribution,
                None => scores.push((chunk_id.clone(), contribution)),
            }
        }
    };
    add(vector_ranking, vector_weight);
    add(lexical_ranking, lexical_weight);

    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scores
}
