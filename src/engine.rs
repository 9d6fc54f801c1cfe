//! Retrieval and resolution engine: `search`, `use`, `read`
//!
//! The engine owns the current [`IndexSnapshot`] behind a swappable handle.
//! Every call loads the snapshot once and works against that immutable view
//! for its whole duration, so a concurrent rebuild never changes results
//! mid-request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::compose::{CompositionResolver, Values, render_with, resolve_values};
use crate::config::Config;
use crate::core::{Precedence, SkillRegistry, SkillRoot, ValidationWarning};
use crate::error::{Result, SwError};
use crate::search::{
    AmbiguityDetector, CacheLayer, Candidate, FusionRanker, HashEmbedder, IndexSnapshot,
    QueryContext, Ranking, Selection, SharedEmbedder, SnapshotHandle, SnapshotOptions,
    SnapshotStats,
};

/// One `search` hit: metadata only, no body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub description: String,
    pub category: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Semantic search was unavailable; scores are lexical
    pub degraded: bool,
}

/// Metadata reported alongside resolved content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillMetadata {
    pub description: String,
    pub category: String,
    pub version: String,
    pub tags: Vec<String>,
    pub precedence: Precedence,
    pub priority: u8,
    /// Skills pulled in through `@include`, first inclusion first
    pub included: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<PathBuf>,
    /// Effective variable values used for rendering
    pub variables: Values,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Match score when reached through `use`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<bool>,
}

/// A fully composed and rendered skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSkill {
    pub name: String,
    pub content: String,
    pub metadata: SkillMetadata,
}

/// Several skills matched with scores too close to choose between.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousResult {
    pub ambiguous: bool,
    pub candidates: Vec<Candidate>,
    pub hint: String,
}

/// Outcome of `use`.
#[derive(Debug, Clone, PartialEq)]
pub enum UseOutcome {
    Resolved(ResolvedSkill),
    Ambiguous(AmbiguousResult),
}

/// Arguments to [`SkillEngine::use_skill`].
#[derive(Debug, Clone)]
pub struct UseRequest {
    pub context: QueryContext,
    pub variables: Values,
    /// Fail with `AmbiguousSelection` instead of returning candidates
    pub force_single: bool,
}

impl UseRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            context: QueryContext::new(query),
            variables: Values::new(),
            force_single: false,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Values) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub const fn with_auto_select(mut self, auto_select: bool) -> Self {
        self.context.auto_select = auto_select;
        self
    }

    #[must_use]
    pub const fn with_force_single(mut self, force_single: bool) -> Self {
        self.force_single = force_single;
        self
    }
}

/// Where skills come from on rebuild.
#[derive(Debug, Clone)]
enum SkillSourceKind {
    Roots(Vec<SkillRoot>),
    /// Fixed in-memory registry; rebuilds re-index it
    Static(Arc<SkillRegistry>),
}

impl SkillSourceKind {
    fn load(&self) -> Result<Arc<SkillRegistry>> {
        match self {
            Self::Roots(roots) => SkillRegistry::load(roots).map(Arc::new),
            Self::Static(registry) => Ok(Arc::clone(registry)),
        }
    }
}

pub struct SkillEngine {
    source: SkillSourceKind,
    embedder: Option<SharedEmbedder>,
    options: SnapshotOptions,
    snapshots: SnapshotHandle,
    ranker: FusionRanker,
    detector: AmbiguityDetector,
    cache: Option<Arc<CacheLayer>>,
    max_depth: usize,
}

impl std::fmt::Debug for SkillEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillEngine")
            .field("generation", &self.snapshots.load().generation())
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// The embedder used when none is injected.
#[must_use]
pub fn default_embedder(config: &Config) -> Option<SharedEmbedder> {
    config
        .search
        .use_embeddings
        .then(|| Arc::new(HashEmbedder::new(config.search.embedding_dims)) as SharedEmbedder)
}

impl SkillEngine {
    /// Load skills from the configured roots (relative to `base`) with the
    /// built-in hash embedder, and build the first snapshot.
    pub fn open(config: &Config, base: &Path) -> Result<Self> {
        Self::open_with_embedder(config, base, default_embedder(config))
    }

    pub fn open_with_embedder(
        config: &Config,
        base: &Path,
        embedder: Option<SharedEmbedder>,
    ) -> Result<Self> {
        let roots = config.skill_paths.roots(base);
        Self::build(SkillSourceKind::Roots(roots), config, embedder)
    }

    /// Engine over an in-memory registry.
    pub fn from_registry(
        registry: SkillRegistry,
        config: &Config,
        embedder: Option<SharedEmbedder>,
    ) -> Result<Self> {
        Self::build(SkillSourceKind::Static(Arc::new(registry)), config, embedder)
    }

    fn build(
        source: SkillSourceKind,
        config: &Config,
        embedder: Option<SharedEmbedder>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = config.cache.enabled.then(|| {
            Arc::new(CacheLayer::with_sizes(
                config.cache.query_capacity,
                config.cache.embedding_capacity,
            ))
        });
        let options = config.search.snapshot_options();
        let registry = source.load()?;
        let snapshot =
            IndexSnapshot::build(registry, embedder.as_ref(), &options, cache.as_deref(), 1)?;

        Ok(Self {
            source,
            embedder,
            options,
            snapshots: SnapshotHandle::new(snapshot),
            ranker: FusionRanker::new(config.search.ranker_config()),
            detector: config.ambiguity.detector(),
            cache,
            max_depth: config.composition.max_depth,
        })
    }

    /// The snapshot currently serving reads.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshots.load()
    }

    #[must_use]
    pub fn stats(&self) -> SnapshotStats {
        self.snapshot().stats()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<(String, ValidationWarning)> {
        self.snapshot().registry().warnings().to_vec()
    }

    /// Reload skills and swap in a new snapshot. Returns its generation.
    pub fn rebuild(&self) -> Result<u64> {
        rebuild_into(
            &self.source,
            self.embedder.as_ref(),
            &self.options,
            self.cache.as_deref(),
            &self.snapshots,
        )
    }

    /// Rebuild on a worker thread; readers keep using the current snapshot
    /// until the new one is published.
    pub fn rebuild_in_background(&self) -> Result<JoinHandle<Result<u64>>> {
        let source = self.source.clone();
        let embedder = self.embedder.clone();
        let options = self.options.clone();
        let cache = self.cache.clone();
        let snapshots = self.snapshots.clone();
        std::thread::Builder::new()
            .name("skillweave-rebuild".to_string())
            .spawn(move || {
                rebuild_into(&source, embedder.as_ref(), &options, cache.as_deref(), &snapshots)
            })
            .map_err(SwError::from)
    }

    /// Full ranking with per-signal diagnostics.
    #[must_use]
    pub fn rank(&self, ctx: &QueryContext) -> Ranking {
        let snapshot = self.snapshot();
        self.rank_in(&snapshot, ctx)
    }

    fn rank_in(&self, snapshot: &IndexSnapshot, ctx: &QueryContext) -> Ranking {
        let generation = snapshot.generation();
        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|c| c.get_ranking(generation, ctx))
        {
            trace!(query = %ctx.query, generation, "ranking cache hit");
            return cached;
        }
        let ranking = self.ranker.rank(snapshot, ctx, self.embedder.as_ref());
        if let Some(cache) = &self.cache {
            cache.put_ranking(generation, ctx, ranking.clone());
        }
        ranking
    }

    /// Ranked skill metadata for a query; no composition or rendering.
    #[must_use]
    pub fn search(&self, ctx: &QueryContext) -> SearchResults {
        let ranking = self.rank(ctx);
        SearchResults {
            hits: ranking
                .results
                .into_iter()
                .map(|r| SearchHit {
                    name: r.name,
                    description: r.description,
                    category: r.category,
                    score: r.score,
                })
                .collect(),
            degraded: ranking.degraded,
        }
    }

    /// Rank, pick (or report ambiguity), then compose and render.
    pub fn use_skill(&self, request: &UseRequest) -> Result<UseOutcome> {
        let snapshot = self.snapshot();
        let ctx = &request.context;
        let ranking = self.rank_in(&snapshot, ctx);

        match self.detector.select(&ranking.results, ctx.auto_select) {
            Selection::Empty => Err(SwError::SkillNotFound(format!(
                "no skill matches query {:?}",
                ctx.query
            ))),
            Selection::Ambiguous { candidates, hint } => {
                if request.force_single {
                    return Err(SwError::AmbiguousSelection {
                        candidates: candidates.into_iter().map(|c| c.name).collect(),
                    });
                }
                debug!(query = %ctx.query, candidates = candidates.len(), "ambiguous match");
                Ok(UseOutcome::Ambiguous(AmbiguousResult {
                    ambiguous: true,
                    candidates,
                    hint,
                }))
            }
            Selection::Single(top) => {
                info!(query = %ctx.query, skill = %top.name, score = top.score, "selected skill");
                let mut resolved = self.resolve_in(&snapshot, &top.name, &request.variables)?;
                resolved.metadata.score = Some(top.score);
                resolved.metadata.degraded = Some(ranking.degraded);
                Ok(UseOutcome::Resolved(resolved))
            }
        }
    }

    /// Compose and render a named skill, bypassing ranking.
    pub fn read(&self, name: &str, variables: &Values) -> Result<ResolvedSkill> {
        let snapshot = self.snapshot();
        self.resolve_in(&snapshot, name, variables)
    }

    fn resolve_in(
        &self,
        snapshot: &IndexSnapshot,
        name: &str,
        variables: &Values,
    ) -> Result<ResolvedSkill> {
        let skill = snapshot
            .skill(name)
            .ok_or_else(|| SwError::SkillNotFound(name.to_string()))?;
        let composed = CompositionResolver::new(snapshot)
            .with_max_depth(self.max_depth)
            .resolve(skill)?;
        let values = resolve_values(&composed.variables, variables)?;
        let content = render_with(&composed.text, &values)?;

        Ok(ResolvedSkill {
            name: skill.name.clone(),
            content,
            metadata: SkillMetadata {
                description: skill.description.clone(),
                category: skill.category.clone(),
                version: skill.version.clone(),
                tags: skill.tags.clone(),
                precedence: skill.precedence,
                priority: skill.priority,
                included: composed.included,
                snippets: composed.snippets,
                variables: values,
                source: skill.source_dir.clone(),
                score: None,
                degraded: None,
            },
        })
    }
}

fn rebuild_into(
    source: &SkillSourceKind,
    embedder: Option<&SharedEmbedder>,
    options: &SnapshotOptions,
    cache: Option<&CacheLayer>,
    snapshots: &SnapshotHandle,
) -> Result<u64> {
    let registry = source.load()?;
    let generation = snapshots.reserve_generation();
    let snapshot = IndexSnapshot::build(registry, embedder, options, cache, generation)?;
    if snapshots.publish(snapshot) {
        if let Some(cache) = cache {
            cache.clear_rankings();
        }
        info!(generation, "published index snapshot");
    }
    Ok(generation)
}
