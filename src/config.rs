use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compose::DEFAULT_MAX_DEPTH;
use crate::core::{Precedence, SkillRoot};
use crate::error::{Result, SwError};
use crate::search::{
    AmbiguityDetector, Bm25Params, FusionWeights, RankerConfig, RrfConfig, SnapshotOptions,
};

pub const CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV: &str = "SW_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub skill_paths: SkillPathsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ambiguity: AmbiguityConfig,
    #[serde(default)]
    pub composition: CompositionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Defaults, then the global and project files (or one explicit file),
    /// then `SW_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?
                .ok_or_else(|| SwError::MissingConfig(format!("{} not found", path.display())))?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&project_root.join(CONFIG_FILE))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from TOML text on top of the defaults.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| SwError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("skillweave").join(CONFIG_FILE))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| SwError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| SwError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.skill_paths {
            self.skill_paths.merge(patch);
        }
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.ambiguity {
            self.ambiguity.merge(patch);
        }
        if let Some(patch) = patch.composition {
            if let Some(value) = patch.max_depth {
                self.composition.max_depth = value;
            }
        }
        if let Some(patch) = patch.cache {
            self.cache.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(&|key| std::env::var(key).ok())
    }

    /// Apply `SW_*` overrides from `env`.
    pub fn apply_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let env = Env(env);

        if let Some(values) = env.list("SW_SKILL_PATHS_ORGANIZATION") {
            self.skill_paths.organization = merge_unique(values, &self.skill_paths.organization);
        }
        if let Some(values) = env.list("SW_SKILL_PATHS_REPOSITORY") {
            self.skill_paths.repository = merge_unique(values, &self.skill_paths.repository);
        }
        if let Some(values) = env.list("SW_SKILL_PATHS_PROJECT") {
            self.skill_paths.project = merge_unique(values, &self.skill_paths.project);
        }
        if let Some(values) = env.list("SW_SKILL_PATHS_USER") {
            self.skill_paths.user = merge_unique(values, &self.skill_paths.user);
        }
        if let Some(values) = env.list("SW_SKILL_PATHS_LOCAL") {
            self.skill_paths.local = merge_unique(values, &self.skill_paths.local);
        }

        if let Some(value) = env.parse::<f32>("SW_SEARCH_BM25_K1")? {
            self.search.bm25_k1 = value;
        }
        if let Some(value) = env.parse::<f32>("SW_SEARCH_BM25_B")? {
            self.search.bm25_b = value;
        }
        if let Some(value) = env.parse::<f32>("SW_SEARCH_RRF_K")? {
            self.search.rrf_k = value;
        }
        if let Some(value) = env.parse::<usize>("SW_SEARCH_CANDIDATE_POOL")? {
            self.search.candidate_pool = value;
        }
        if let Some(value) = env.bool("SW_SEARCH_USE_EMBEDDINGS") {
            self.search.use_embeddings = value;
        }
        if let Some(value) = env.parse::<usize>("SW_SEARCH_EMBEDDING_DIMS")? {
            self.search.embedding_dims = value;
        }
        if let Some(value) = env.duration("SW_SEARCH_EMBEDDING_TIMEOUT")? {
            self.search.embedding_timeout = value;
        }
        if let Some(value) = env.parse::<usize>("SW_SEARCH_EXCERPT_CHARS")? {
            self.search.excerpt_chars = value;
        }

        if let Some(value) = env.parse::<f32>("SW_AMBIGUITY_DELTA")? {
            self.ambiguity.delta = value;
        }
        if let Some(value) = env.parse::<usize>("SW_AMBIGUITY_MAX_CANDIDATES")? {
            self.ambiguity.max_candidates = value;
        }

        if let Some(value) = env.parse::<usize>("SW_COMPOSITION_MAX_DEPTH")? {
            self.composition.max_depth = value;
        }

        if let Some(value) = env.bool("SW_CACHE_ENABLED") {
            self.cache.enabled = value;
        }
        if env.bool("SW_CACHE_DISABLED").unwrap_or(false) {
            self.cache.enabled = false;
        }

        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.bm25_k1 < 0.0 || !(0.0..=1.0).contains(&s.bm25_b) {
            return Err(SwError::Config(format!(
                "search.bm25_k1 must be >= 0 and search.bm25_b in [0, 1] (got {}, {})",
                s.bm25_k1, s.bm25_b
            )));
        }
        if s.rrf_k <= 0.0 {
            return Err(SwError::Config(format!("search.rrf_k must be > 0 (got {})", s.rrf_k)));
        }
        if s.candidate_pool == 0 || s.embedding_dims == 0 {
            return Err(SwError::Config(
                "search.candidate_pool and search.embedding_dims must be > 0".to_string(),
            ));
        }
        let w = &s.weights;
        if w.lexical < 0.0 || w.scope < 0.0 || w.priority < 0.0 {
            return Err(SwError::Config("search.weights must be non-negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.ambiguity.delta) {
            return Err(SwError::Config(format!(
                "ambiguity.delta must be in [0, 1] (got {})",
                self.ambiguity.delta
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillPathsConfig {
    #[serde(default)]
    pub organization: Vec<String>,
    #[serde(default)]
    pub repository: Vec<String>,
    #[serde(default)]
    pub project: Vec<String>,
    #[serde(default)]
    pub user: Vec<String>,
    #[serde(default)]
    pub local: Vec<String>,
}

impl Default for SkillPathsConfig {
    fn default() -> Self {
        Self {
            organization: Vec::new(),
            repository: Vec::new(),
            project: vec![".skillweave/skills".to_string()],
            user: vec!["~/.local/share/skillweave/skills".to_string()],
            local: Vec::new(),
        }
    }
}

impl SkillPathsConfig {
    fn merge(&mut self, patch: SkillPathsPatch) {
        if let Some(values) = patch.organization {
            self.organization = merge_unique(values, &self.organization);
        }
        if let Some(values) = patch.repository {
            self.repository = merge_unique(values, &self.repository);
        }
        if let Some(values) = patch.project {
            self.project = merge_unique(values, &self.project);
        }
        if let Some(values) = patch.user {
            self.user = merge_unique(values, &self.user);
        }
        if let Some(values) = patch.local {
            self.local = merge_unique(values, &self.local);
        }
    }

    /// Skill roots, least specific layer first. `~` expands to the home
    /// directory; relative paths resolve against `base`.
    #[must_use]
    pub fn roots(&self, base: &Path) -> Vec<SkillRoot> {
        let layers = [
            (Precedence::Organization, &self.organization),
            (Precedence::Repository, &self.repository),
            (Precedence::Project, &self.project),
            (Precedence::User, &self.user),
            (Precedence::Local, &self.local),
        ];
        layers
            .into_iter()
            .flat_map(|(layer, paths)| {
                paths
                    .iter()
                    .map(move |p| SkillRoot::new(expand_path(p, base), layer))
            })
            .collect()
    }
}

fn expand_path(raw: &str, base: &Path) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    /// Weight of normalized RRF
    pub lexical: f32,
    pub scope: f32,
    pub priority: f32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        let w = FusionWeights::default();
        Self {
            lexical: w.rrf,
            scope: w.scope,
            priority: w.priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub rrf_k: f32,
    pub candidate_pool: usize,
    #[serde(default)]
    pub weights: WeightsConfig,
    pub use_embeddings: bool,
    pub embedding_dims: usize,
    #[serde(with = "humantime_serde")]
    pub embedding_timeout: Duration,
    pub excerpt_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let bm25 = Bm25Params::default();
        Self {
            bm25_k1: bm25.k1,
            bm25_b: bm25.b,
            rrf_k: RrfConfig::default().k,
            candidate_pool: 20,
            weights: WeightsConfig::default(),
            use_embeddings: true,
            embedding_dims: 384,
            embedding_timeout: Duration::from_secs(3),
            excerpt_chars: 500,
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.bm25_k1 {
            self.bm25_k1 = value;
        }
        if let Some(value) = patch.bm25_b {
            self.bm25_b = value;
        }
        if let Some(value) = patch.rrf_k {
            self.rrf_k = value;
        }
        if let Some(value) = patch.candidate_pool {
            self.candidate_pool = value;
        }
        if let Some(patch) = patch.weights {
            if let Some(value) = patch.lexical {
                self.weights.lexical = value;
            }
            if let Some(value) = patch.scope {
                self.weights.scope = value;
            }
            if let Some(value) = patch.priority {
                self.weights.priority = value;
            }
        }
        if let Some(value) = patch.use_embeddings {
            self.use_embeddings = value;
        }
        if let Some(value) = patch.embedding_dims {
            self.embedding_dims = value;
        }
        if let Some(value) = patch.embedding_timeout {
            self.embedding_timeout = value;
        }
        if let Some(value) = patch.excerpt_chars {
            self.excerpt_chars = value;
        }
    }

    #[must_use]
    pub fn ranker_config(&self) -> RankerConfig {
        RankerConfig {
            candidate_pool: self.candidate_pool,
            rrf: RrfConfig { k: self.rrf_k },
            weights: FusionWeights {
                rrf: self.weights.lexical,
                scope: self.weights.scope,
                priority: self.weights.priority,
            },
            embed_timeout: self.embedding_timeout,
        }
    }

    #[must_use]
    pub const fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            bm25: Bm25Params {
                k1: self.bm25_k1,
                b: self.bm25_b,
            },
            excerpt_chars: self.excerpt_chars,
            use_embeddings: self.use_embeddings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbiguityConfig {
    pub delta: f32,
    pub max_candidates: usize,
}

impl Default for AmbiguityConfig {
    fn default() -> Self {
        let detector = AmbiguityDetector::default();
        Self {
            delta: detector.delta,
            max_candidates: detector.max_candidates,
        }
    }
}

impl AmbiguityConfig {
    fn merge(&mut self, patch: AmbiguityPatch) {
        if let Some(value) = patch.delta {
            self.delta = value;
        }
        if let Some(value) = patch.max_candidates {
            self.max_candidates = value;
        }
    }

    #[must_use]
    pub const fn detector(&self) -> AmbiguityDetector {
        AmbiguityDetector::new(self.delta, self.max_candidates)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub max_depth: usize,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub query_capacity: usize,
    pub embedding_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            query_capacity: crate::search::cache::DEFAULT_QUERY_CACHE_SIZE,
            embedding_capacity: crate::search::cache::DEFAULT_EMBEDDING_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    fn merge(&mut self, patch: CachePatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.query_capacity {
            self.query_capacity = value;
        }
        if let Some(value) = patch.embedding_capacity {
            self.embedding_capacity = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub skill_paths: Option<SkillPathsPatch>,
    pub search: Option<SearchPatch>,
    pub ambiguity: Option<AmbiguityPatch>,
    pub composition: Option<CompositionPatch>,
    pub cache: Option<CachePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SkillPathsPatch {
    pub organization: Option<Vec<String>>,
    pub repository: Option<Vec<String>>,
    pub project: Option<Vec<String>>,
    pub user: Option<Vec<String>>,
    pub local: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchPatch {
    pub bm25_k1: Option<f32>,
    pub bm25_b: Option<f32>,
    pub rrf_k: Option<f32>,
    pub candidate_pool: Option<usize>,
    pub weights: Option<WeightsPatch>,
    pub use_embeddings: Option<bool>,
    pub embedding_dims: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub embedding_timeout: Option<Duration>,
    pub excerpt_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WeightsPatch {
    pub lexical: Option<f32>,
    pub scope: Option<f32>,
    pub priority: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AmbiguityPatch {
    pub delta: Option<f32>,
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompositionPatch {
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CachePatch {
    pub enabled: Option<bool>,
    pub query_capacity: Option<usize>,
    pub embedding_capacity: Option<usize>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

/// Typed accessors over an environment lookup.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn bool(&self, key: &str) -> Option<bool> {
        (self.0)(key).map(|value| {
            matches!(
                value.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|err| SwError::Config(format!("invalid {key} value {value}: {err}"))),
            None => Ok(None),
        }
    }

    fn duration(&self, key: &str) -> Result<Option<Duration>> {
        match (self.0)(key) {
            Some(value) => humantime_serde::re::humantime::parse_duration(value.trim())
                .map(Some)
                .map_err(|err| SwError::Config(format!("invalid {key} value {value}: {err}"))),
            None => Ok(None),
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        (self.0)(key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
