//! Bounded LRU caches for rankings and skill embeddings.
//!
//! Ranking entries are keyed by snapshot generation plus the query context,
//! so a published rebuild never serves a stale ranking. Embedding entries
//! carry the SHA-256 of the text they were computed from and miss when the
//! skill text changes.
//!
//! Lookups use `try_lock`: a contended cache answers like a miss instead of
//! blocking a query.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::context::QueryContext;
use super::ranker::Ranking;

pub const DEFAULT_QUERY_CACHE_SIZE: usize = 128;
pub const DEFAULT_EMBEDDING_CACHE_SIZE: usize = 1024;

/// Hex SHA-256 of `text`, used as the embedding cache validator.
#[must_use]
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RankingKey {
    generation: u64,
    query: String,
    paths: Vec<String>,
    languages: Vec<String>,
    limit: usize,
}

impl RankingKey {
    fn new(generation: u64, ctx: &QueryContext) -> Self {
        Self {
            generation,
            query: ctx.query.trim().to_string(),
            paths: ctx.active_paths.clone(),
            languages: ctx.languages.clone(),
            limit: ctx.limit,
        }
    }
}

#[derive(Debug)]
struct EmbeddingEntry {
    digest: String,
    vector: Vec<f32>,
}

/// Hit and miss counters for both caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub query_hits: u64,
    pub query_misses: u64,
    pub embedding_hits: u64,
    pub embedding_misses: u64,
}

impl CacheStats {
    #[must_use]
    pub fn query_hit_rate(&self) -> f64 {
        ratio(self.query_hits, self.query_misses)
    }

    #[must_use]
    pub fn embedding_hit_rate(&self) -> f64 {
        ratio(self.embedding_hits, self.embedding_misses)
    }
}

fn ratio(hits: u64, misses: u64) -> f64 {
    match hits + misses {
        0 => 0.0,
        total => hits as f64 / total as f64,
    }
}

#[derive(Debug)]
pub struct CacheLayer {
    rankings: Mutex<LruCache<RankingKey, Ranking>>,
    embeddings: Mutex<LruCache<String, EmbeddingEntry>>,
    stats: Mutex<CacheStats>,
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_QUERY_CACHE_SIZE, DEFAULT_EMBEDDING_CACHE_SIZE)
    }

    /// Zero capacities are clamped to one entry.
    #[must_use]
    pub fn with_sizes(rankings: usize, embeddings: usize) -> Self {
        let cap = |n: usize| NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN);
        Self {
            rankings: Mutex::new(LruCache::new(cap(rankings))),
            embeddings: Mutex::new(LruCache::new(cap(embeddings))),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Some(mut stats) = self.stats.try_lock() {
            update(&mut stats);
        }
    }

    pub fn get_ranking(&self, generation: u64, ctx: &QueryContext) -> Option<Ranking> {
        let found = self
            .rankings
            .try_lock()
            .and_then(|mut cache| cache.get(&RankingKey::new(generation, ctx)).cloned());
        let hit = found.is_some();
        self.record(|s| if hit { s.query_hits += 1 } else { s.query_misses += 1 });
        found
    }

    pub fn put_ranking(&self, generation: u64, ctx: &QueryContext, ranking: Ranking) {
        if let Some(mut cache) = self.rankings.try_lock() {
            cache.put(RankingKey::new(generation, ctx), ranking);
        }
    }

    /// Cached vector for `skill`, only if it was computed from text with `digest`.
    pub fn get_embedding(&self, skill: &str, digest: &str) -> Option<Vec<f32>> {
        let found = self.embeddings.try_lock().and_then(|mut cache| {
            cache
                .get(skill)
                .filter(|entry| entry.digest == digest)
                .map(|entry| entry.vector.clone())
        });
        let hit = found.is_some();
        self.record(|s| if hit { s.embedding_hits += 1 } else { s.embedding_misses += 1 });
        found
    }

    pub fn put_embedding(&self, skill: &str, digest: &str, vector: Vec<f32>) {
        if let Some(mut cache) = self.embeddings.try_lock() {
            cache.put(
                skill.to_string(),
                EmbeddingEntry {
                    digest: digest.to_string(),
                    vector,
                },
            );
        }
    }

    /// Drop cached rankings; embeddings stay valid across rebuilds.
    pub fn clear_rankings(&self) {
        self.rankings.lock().clear();
    }

    pub fn clear(&self) {
        self.clear_rankings();
        self.embeddings.lock().clear();
        *self.stats.lock() = CacheStats::default();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    /// Entry counts as (rankings, embeddings).
    #[must_use]
    pub fn sizes(&self) -> (usize, usize) {
        (self.rankings.lock().len(), self.embeddings.lock().len())
    }
}
