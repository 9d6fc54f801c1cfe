//! Context-aware search ranking
//!
//! [`QueryContext`] carries the caller's request; [`scope_boost`] turns a
//! skill's declared scope into a relevance signal in `[0, 1]`.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::core::Scope;

/// Boost for skills that declare no scope, or where nothing can be judged.
pub const NEUTRAL_BOOST: f32 = 0.5;

/// Ceiling for boosts earned from path/language overlap alone.
const OVERLAP_CEILING: f32 = 0.8;

pub const DEFAULT_LIMIT: usize = 5;

/// Caller input for one retrieval call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub query: String,
    #[serde(default)]
    pub active_paths: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub auto_select: bool,
}

const fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl QueryContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            active_paths: Vec::new(),
            languages: Vec::new(),
            limit: DEFAULT_LIMIT,
            auto_select: false,
        }
    }

    #[must_use]
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_auto_select(mut self, auto_select: bool) -> Self {
        self.auto_select = auto_select;
        self
    }

    /// Explicit languages plus those inferred from active path extensions,
    /// lowercased and de-duplicated.
    #[must_use]
    pub fn effective_languages(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let inferred = self
            .active_paths
            .iter()
            .filter_map(|p| language_for_path(p))
            .map(str::to_string);
        for lang in self
            .languages
            .iter()
            .map(|l| l.trim().to_lowercase())
            .chain(inferred)
        {
            if !lang.is_empty() && !out.contains(&lang) {
                out.push(lang);
            }
        }
        out
    }
}

/// Relevance boost of a skill's scope for this query.
///
/// - no scope: [`NEUTRAL_BOOST`]
/// - any trigger found in the query (case-insensitive substring): 1.0
/// - otherwise the mean of applicable signals, scaled to at most 0.8:
///   unmatched triggers count 0, path overlap is the fraction of active
///   paths matching a scope glob, language overlap is 1 or 0
/// - nothing applicable: [`NEUTRAL_BOOST`]
#[must_use]
pub fn scope_boost(scope: Option<&Scope>, ctx: &QueryContext) -> f32 {
    let Some(scope) = scope.filter(|s| !s.is_empty()) else {
        return NEUTRAL_BOOST;
    };

    let query = ctx.query.to_lowercase();
    if scope
        .triggers
        .iter()
        .map(|t| t.trim().to_lowercase())
        .any(|t| !t.is_empty() && query.contains(&t))
    {
        return 1.0;
    }

    let mut signals: Vec<f32> = Vec::with_capacity(3);
    if !scope.triggers.is_empty() {
        signals.push(0.0);
    }
    if !scope.paths.is_empty() && !ctx.active_paths.is_empty() {
        signals.push(path_overlap(&scope.paths, &ctx.active_paths));
    }
    let languages = ctx.effective_languages();
    if !scope.languages.is_empty() && !languages.is_empty() {
        let hit = scope
            .languages
            .iter()
            .any(|l| languages.contains(&l.trim().to_lowercase()));
        signals.push(if hit { 1.0 } else { 0.0 });
    }

    if signals.is_empty() {
        return NEUTRAL_BOOST;
    }
    OVERLAP_CEILING * signals.iter().sum::<f32>() / signals.len() as f32
}

/// Fraction of `active_paths` matched by at least one glob in `patterns`.
fn path_overlap(patterns: &[String], active_paths: &[String]) -> f32 {
    let compiled: Vec<Pattern> = patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();
    if compiled.is_empty() {
        return 0.0;
    }
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let matched = active_paths
        .iter()
        .map(|p| p.replace('\\', "/"))
        .filter(|p| {
            let trimmed = p.trim_start_matches("./");
            compiled.iter().any(|pat| pat.matches_with(trimmed, options))
        })
        .count();
    matched as f32 / active_paths.len() as f32
}

/// Best-effort language name from a file extension.
#[must_use]
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
    let lang = match ext.as_str() {
        "py" | "pyi" => "python",
        "rs" => "rust",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "php" => "php",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "tf" | "hcl" => "hcl",
        "md" => "markdown",
        _ => return None,
    };
    Some(lang)
}
