//! RRF (Reciprocal Rank Fusion) for hybrid search

use std::collections::HashMap;

use serde::Serialize;

/// Reciprocal Rank Fusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfConfig {
    /// Smoothing constant (default: 60)
    pub k: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

/// A skill's fused rank information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridResult {
    pub skill_name: String,
    /// Sum of `1 / (rank + k)` over the lists the skill appears in
    pub rrf: f32,
    /// 1-based rank in the lexical list
    pub bm25_rank: Option<usize>,
    /// 1-based rank in the semantic list
    pub semantic_rank: Option<usize>,
}

/// Fuse ranked lists of skill names with RRF.
///
/// Ranks are 1-based; a skill absent from a list contributes nothing from it.
/// Output is sorted by fused score, then name.
#[must_use]
pub fn fuse_results(bm25: &[&str], semantic: &[&str], config: &RrfConfig) -> Vec<HybridResult> {
    let mut fused: HashMap<&str, HybridResult> = HashMap::new();

    for (idx, &name) in bm25.iter().enumerate() {
        let rank = idx + 1;
        let entry = fused.entry(name).or_insert_with(|| empty(name));
        if entry.bm25_rank.is_none() {
            entry.bm25_rank = Some(rank);
            entry.rrf += rrf_term(rank, config.k);
        }
    }
    for (idx, &name) in semantic.iter().enumerate() {
        let rank = idx + 1;
        let entry = fused.entry(name).or_insert_with(|| empty(name));
        if entry.semantic_rank.is_none() {
            entry.semantic_rank = Some(rank);
            entry.rrf += rrf_term(rank, config.k);
        }
    }

    let mut results: Vec<HybridResult> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.rrf
            .total_cmp(&a.rrf)
            .then_with(|| a.skill_name.cmp(&b.skill_name))
    });
    results
}

/// Scale fused scores into `[0, 1]` by dividing by the best score.
#[must_use]
pub fn normalize(results: &[HybridResult]) -> Vec<f32> {
    let max = results.iter().map(|r| r.rrf).fold(0.0f32, f32::max);
    results
        .iter()
        .map(|r| if max > 0.0 { r.rrf / max } else { 0.0 })
        .collect()
}

fn empty(name: &str) -> HybridResult {
    HybridResult {
        skill_name: name.to_string(),
        rrf: 0.0,
        bm25_rank: None,
        semantic_rank: None,
    }
}

fn rrf_term(rank: usize, k: f32) -> f32 {
    1.0 / (rank as f32 + k)
}
