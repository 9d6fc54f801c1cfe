//! Fusion ranker: lexical + semantic candidates, RRF, scope and priority blend
//!
//! Each signal (normalized RRF, scope boost, priority) is computed on its own
//! and only combined in [`composite_score`], so weights can be tuned without
//! touching the signals.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::context::{QueryContext, scope_boost};
use super::embeddings::SharedEmbedder;
use super::hybrid::{RrfConfig, fuse_results, normalize};
use super::snapshot::IndexSnapshot;
use crate::core::Precedence;
use crate::error::{SwError, Result};

/// Weights of the composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub rrf: f32,
    pub scope: f32,
    pub priority: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            rrf: 0.6,
            scope: 0.25,
            priority: 0.15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankerConfig {
    /// Candidates pulled from each index (never below the requested limit)
    pub candidate_pool: usize,
    pub rrf: RrfConfig,
    pub weights: FusionWeights,
    /// Budget for embedding the query before degrading to lexical-only
    pub embed_timeout: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 20,
            rrf: RrfConfig::default(),
            weights: FusionWeights::default(),
            embed_timeout: Duration::from_secs(3),
        }
    }
}

/// One ranked candidate with the signals that produced its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSkill {
    pub name: String,
    pub description: String,
    pub category: String,
    /// Externally reported score: semantic cosine similarity in `[0, 1]`,
    /// or normalized BM25 when semantic search was unavailable.
    pub score: f32,
    /// Internal ordering key
    pub composite: f32,
    pub rrf: f32,
    pub rrf_normalized: f32,
    pub scope_boost: f32,
    pub priority: u8,
    pub precedence: Precedence,
    pub bm25_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
    pub bm25_score: Option<f32>,
    pub semantic_score: Option<f32>,
}

/// Output of one ranking call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ranking {
    pub results: Vec<RankedSkill>,
    /// True when semantic search was not used for this call
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

/// `w_rrf * rrf_norm + w_scope * boost + w_priority * priority / 100`
#[must_use]
pub fn composite_score(weights: &FusionWeights, rrf_norm: f32, boost: f32, priority: u8) -> f32 {
    weights.rrf * rrf_norm + weights.scope * boost + weights.priority * (f32::from(priority) / 100.0)
}

/// Final ordering: composite, then priority, then the more specific
/// precedence, then name.
#[must_use]
pub fn compare_ranked(a: &RankedSkill, b: &RankedSkill) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| b.precedence.specificity().cmp(&a.precedence.specificity()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Embed `text` on a helper thread, giving up after `timeout`.
pub fn embed_with_timeout(
    embedder: &SharedEmbedder,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker = SharedEmbedder::clone(embedder);
    let text = text.to_string();
    std::thread::Builder::new()
        .name("skillweave-embed".to_string())
        .spawn(move || {
            let _ = tx.send(worker.embed(&text));
        })
        .map_err(|err| SwError::IndexUnavailable(format!("spawn embed worker: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(vector)) => Ok(vector),
        Ok(Err(err)) => Err(SwError::IndexUnavailable(format!("{err:#}"))),
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(SwError::IndexUnavailable(
            format!("embedding timed out after {timeout:?}"),
        )),
        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(
            SwError::IndexUnavailable("embedding worker exited without a result".to_string()),
        ),
    }
}

/// Ranks skills in a snapshot for a query.
#[derive(Debug, Clone, Default)]
pub struct FusionRanker {
    config: RankerConfig,
}

impl FusionRanker {
    #[must_use]
    pub const fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Rank the snapshot's skills for `ctx`, returning at most `ctx.limit` results.
    pub fn rank(
        &self,
        snapshot: &IndexSnapshot,
        ctx: &QueryContext,
        embedder: Option<&SharedEmbedder>,
    ) -> Ranking {
        let start = Instant::now();
        if ctx.query.trim().is_empty() || ctx.limit == 0 {
            return Ranking::default();
        }
        let pool = self.config.candidate_pool.max(ctx.limit);

        let lexical = snapshot.lexical().search(&ctx.query, pool);
        let max_bm25 = lexical.iter().map(|h| h.score).fold(0.0f32, f32::max);
        let bm25_scores: HashMap<&str, f32> = lexical
            .iter()
            .map(|h| (h.skill_name.as_str(), h.score))
            .collect();

        let semantic = match (snapshot.semantic(), embedder) {
            (Some(index), Some(embedder)) => {
                match embed_with_timeout(embedder, &ctx.query, self.config.embed_timeout) {
                    Ok(vector) if vector.len() == index.dims() => Ok((index, vector)),
                    Ok(vector) => Err(SwError::IndexUnavailable(format!(
                        "query embedding has {} dims, index has {}",
                        vector.len(),
                        index.dims()
                    ))),
                    Err(err) => Err(err),
                }
            }
            (None, _) => Err(SwError::IndexUnavailable(
                snapshot
                    .semantic_error()
                    .unwrap_or("semantic index not built")
                    .to_string(),
            )),
            (Some(_), None) => Err(SwError::IndexUnavailable(
                "no embedder configured".to_string(),
            )),
        };

        let (semantic_hits, query_vector, degraded_reason) = match semantic {
            Ok((index, vector)) => (index.search(&vector, pool), Some((index, vector)), None),
            Err(err) => {
                warn!(error = %err, "semantic search unavailable, using lexical ranking only");
                (Vec::new(), None, Some(err.to_string()))
            }
        };

        let lexical_names: Vec<&str> = lexical.iter().map(|h| h.skill_name.as_str()).collect();
        let semantic_names: Vec<&str> = semantic_hits
            .iter()
            .map(|h| h.skill_name.as_str())
            .collect();
        let fused = fuse_results(&lexical_names, &semantic_names, &self.config.rrf);
        let normalized = normalize(&fused);

        let mut results: Vec<RankedSkill> = fused
            .iter()
            .zip(normalized)
            .filter_map(|(hit, rrf_norm)| {
                let skill = snapshot.skill(&hit.skill_name)?;
                let boost = scope_boost(skill.scope.as_ref(), ctx);
                let bm25_score = bm25_scores.get(hit.skill_name.as_str()).copied();
                let semantic_score = query_vector
                    .as_ref()
                    .and_then(|(index, vector)| index.similarity(&hit.skill_name, vector));
                let score = if query_vector.is_some() {
                    semantic_score.unwrap_or(0.0).clamp(0.0, 1.0)
                } else if max_bm25 > 0.0 {
                    bm25_score.map_or(0.0, |s| s / max_bm25)
                } else {
                    0.0
                };
                Some(RankedSkill {
                    name: skill.name.clone(),
                    description: skill.description.clone(),
                    category: skill.category.clone(),
                    score,
                    composite: composite_score(&self.config.weights, rrf_norm, boost, skill.priority),
                    rrf: hit.rrf,
                    rrf_normalized: rrf_norm,
                    scope_boost: boost,
                    priority: skill.priority,
                    precedence: skill.precedence,
                    bm25_rank: hit.bm25_rank,
                    semantic_rank: hit.semantic_rank,
                    bm25_score,
                    semantic_score,
                })
            })
            .collect();

        results.sort_by(compare_ranked);
        results.truncate(ctx.limit);

        debug!(
            query = %ctx.query,
            lexical = lexical.len(),
            semantic = semantic_hits.len(),
            returned = results.len(),
            degraded = degraded_reason.is_some(),
            elapsed_us = start.elapsed().as_micros(),
            "ranked skills"
        );

        Ranking {
            results,
            degraded: degraded_reason.is_some(),
            degraded_reason,
        }
    }
}
