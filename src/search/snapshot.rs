//! Immutable index snapshots and the handle readers load them from
//!
//! A snapshot bundles the effective skill definitions with the lexical and
//! semantic indexes built from them. Readers clone the `Arc` under a short
//! read lock; a rebuild constructs a new snapshot off to the side and swaps
//! it in under the write lock, so a query sees either the old or the new
//! snapshot, never a mix.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::{CacheLayer, content_hash};
use super::embeddings::{SharedEmbedder, VectorIndex, embed_all};
use super::tantivy::{Bm25Index, Bm25Params};
use crate::core::{SkillDefinition, SkillRegistry};
use crate::error::Result;

/// Knobs used when building a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub bm25: Bm25Params,
    /// Body characters included in the embedding text
    pub excerpt_chars: usize,
    pub use_embeddings: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            excerpt_chars: 500,
            use_embeddings: true,
        }
    }
}

/// Summary reported by `index` and `status`-style callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotStats {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub skills: usize,
    pub overrides: usize,
    pub terms: usize,
    pub embedded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_error: Option<String>,
    pub warnings: usize,
}

/// Everything a query needs, frozen at build time.
#[derive(Debug)]
pub struct IndexSnapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    registry: Arc<SkillRegistry>,
    effective: BTreeMap<String, SkillDefinition>,
    lexical: Bm25Index,
    semantic: Option<VectorIndex>,
    semantic_error: Option<String>,
    embedder_name: Option<String>,
}

impl IndexSnapshot {
    /// Build lexical and semantic indexes for every skill in `registry`.
    ///
    /// Fails only when a skill's override cannot be merged. An embedding
    /// failure leaves the snapshot lexical-only and records the reason.
    pub fn build(
        registry: Arc<SkillRegistry>,
        embedder: Option<&SharedEmbedder>,
        options: &SnapshotOptions,
        cache: Option<&CacheLayer>,
        generation: u64,
    ) -> Result<Self> {
        let start = Instant::now();

        let effective = registry
            .names()
            .map(|name| registry.effective(name).map(|skill| (name.to_string(), skill)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut lexical = Bm25Index::new(options.bm25);
        lexical.index(
            effective
                .values()
                .map(|skill| (skill.name.clone(), skill.lexical_text())),
        );

        let (semantic, semantic_error) = match embedder {
            Some(embedder) if options.use_embeddings => {
                match build_semantic(&effective, embedder, options.excerpt_chars, cache) {
                    Ok(index) => (Some(index), None),
                    Err(err) => {
                        warn!(error = %err, "semantic index unavailable, snapshot is lexical-only");
                        (None, Some(err.to_string()))
                    }
                }
            }
            Some(_) => (None, Some("embeddings disabled".to_string())),
            None => (None, Some("no embedder configured".to_string())),
        };

        info!(
            generation,
            skills = effective.len(),
            terms = lexical.term_count(),
            semantic = semantic.is_some(),
            elapsed_ms = start.elapsed().as_millis(),
            "built index snapshot"
        );

        Ok(Self {
            generation,
            built_at: Utc::now(),
            registry,
            effective,
            lexical,
            semantic,
            semantic_error,
            embedder_name: embedder.map(|e| e.name().to_string()),
        })
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[must_use]
    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Effective (override-merged) definition of a skill.
    #[must_use]
    pub fn skill(&self, name: &str) -> Option<&SkillDefinition> {
        self.effective.get(name)
    }

    pub fn skills(&self) -> impl Iterator<Item = &SkillDefinition> {
        self.effective.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effective.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }

    #[must_use]
    pub const fn lexical(&self) -> &Bm25Index {
        &self.lexical
    }

    #[must_use]
    pub const fn semantic(&self) -> Option<&VectorIndex> {
        self.semantic.as_ref()
    }

    #[must_use]
    pub fn semantic_error(&self) -> Option<&str> {
        self.semantic_error.as_deref()
    }

    #[must_use]
    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            generation: self.generation,
            built_at: self.built_at,
            skills: self.effective.len(),
            overrides: self.registry.override_count(),
            terms: self.lexical.term_count(),
            embedded: self.semantic.as_ref().map_or(0, VectorIndex::len),
            embedder: self.embedder_name.clone(),
            semantic_error: self.semantic_error.clone(),
            warnings: self.registry.warnings().len(),
        }
    }
}

fn build_semantic(
    effective: &BTreeMap<String, SkillDefinition>,
    embedder: &SharedEmbedder,
    excerpt_chars: usize,
    cache: Option<&CacheLayer>,
) -> Result<VectorIndex> {
    let mut vectors: Vec<(String, Vec<f32>)> = Vec::with_capacity(effective.len());
    let mut missing: Vec<(String, String)> = Vec::new();
    let mut hashes: BTreeMap<String, String> = BTreeMap::new();

    for skill in effective.values() {
        let text = skill.embedding_text(excerpt_chars);
        let hash = content_hash(&text);
        match cache.and_then(|c| c.get_embedding(&skill.name, &hash)) {
            Some(vector) => vectors.push((skill.name.clone(), vector)),
            None => {
                hashes.insert(skill.name.clone(), hash);
                missing.push((skill.name.clone(), text));
            }
        }
    }

    debug!(
        cached = vectors.len(),
        embedding = missing.len(),
        embedder = embedder.name(),
        "embedding skills"
    );

    let fresh = embed_all(&missing, embedder.as_ref())?;
    if let Some(cache) = cache {
        for (name, vector) in &fresh {
            if let Some(hash) = hashes.get(name) {
                cache.put_embedding(name, hash, vector.clone());
            }
        }
    }
    vectors.extend(fresh);
    VectorIndex::from_vectors(embedder.dims(), vectors)
}

/// Shared, swappable pointer to the current snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Arc<IndexSnapshot>>>,
    next_generation: Arc<AtomicU64>,
}

impl SnapshotHandle {
    #[must_use]
    pub fn new(initial: IndexSnapshot) -> Self {
        let next = initial.generation() + 1;
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
            next_generation: Arc::new(AtomicU64::new(next)),
        }
    }

    /// The snapshot in effect right now.
    #[must_use]
    pub fn load(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Reserve a generation number for a snapshot about to be built.
    #[must_use]
    pub fn reserve_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish `snapshot` unless a newer one is already in place.
    ///
    /// Returns whether the swap happened.
    pub fn publish(&self, snapshot: IndexSnapshot) -> bool {
        let mut current = self.current.write();
        if snapshot.generation() <= current.generation() {
            debug!(
                offered = snapshot.generation(),
                current = current.generation(),
                "discarding stale snapshot"
            );
            return false;
        }
        *current = Arc::new(snapshot);
        true
    }
}
