//! Composition resolver: expands `@include` directives into one document
//!
//! Two directive forms, each on its own line:
//!
//! ```text
//! @include skill:<name>      splice another skill's expanded body
//! @include <relative-path>   splice a snippet file verbatim
//! ```
//!
//! Skill includes recurse; snippet files do not. Recursion is bounded by a
//! depth limit and by cycle detection over the current ancestor chain, so
//! every include graph terminates.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use super::fence_marker;
use crate::core::{SkillDefinition, VariableSpec};
use crate::error::{Result, SwError};
use crate::search::IndexSnapshot;
use crate::security::resolve_confined;

pub const DEFAULT_MAX_DEPTH: usize = 5;

const DIRECTIVE: &str = "@include";
const SKILL_PREFIX: &str = "skill:";

/// Lookup of effective (override-merged) skill definitions by name.
pub trait SkillSource {
    fn skill(&self, name: &str) -> Option<&SkillDefinition>;
}

impl SkillSource for IndexSnapshot {
    fn skill(&self, name: &str) -> Option<&SkillDefinition> {
        Self::skill(self, name)
    }
}

impl SkillSource for BTreeMap<String, SkillDefinition> {
    fn skill(&self, name: &str) -> Option<&SkillDefinition> {
        self.get(name)
    }
}

/// Target of one `@include` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeTarget {
    Skill(String),
    Path(String),
}

impl IncludeTarget {
    fn reference(&self) -> String {
        match self {
            Self::Skill(name) => format!("{SKILL_PREFIX}{name}"),
            Self::Path(path) => path.clone(),
        }
    }
}

/// Parse a single line as an include directive.
#[must_use]
pub fn parse_directive(line: &str) -> Option<IncludeTarget> {
    let rest = line.trim().strip_prefix(DIRECTIVE)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let target = rest.trim();
    if target.is_empty() || target.contains(char::is_whitespace) {
        return None;
    }
    Some(match target.strip_prefix(SKILL_PREFIX) {
        Some(name) => IncludeTarget::Skill(name.to_string()),
        None => IncludeTarget::Path(target.to_string()),
    })
}

/// Result of expanding a skill and its include tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedDocument {
    pub text: String,
    /// Included skills in first-inclusion order, root excluded
    pub included: Vec<String>,
    /// Snippet files spliced in
    pub snippets: Vec<PathBuf>,
    /// Variables declared anywhere in the tree; outer declarations win
    #[serde(skip)]
    pub variables: BTreeMap<String, VariableSpec>,
}

#[derive(Default)]
struct Walk {
    chain: Vec<String>,
    included: Vec<String>,
    snippets: Vec<PathBuf>,
    variables: BTreeMap<String, VariableSpec>,
}

/// Expands include directives against a [`SkillSource`].
pub struct CompositionResolver<'a, S: SkillSource + ?Sized> {
    source: &'a S,
    max_depth: usize,
}

impl<'a, S: SkillSource + ?Sized> CompositionResolver<'a, S> {
    pub const fn new(source: &'a S) -> Self {
        Self {
            source,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Expand `root` (already override-merged) into a single document.
    pub fn resolve(&self, root: &SkillDefinition) -> Result<ComposedDocument> {
        let mut walk = Walk::default();
        let text = self.expand(root, 0, &mut walk)?;
        debug!(
            skill = %root.name,
            included = walk.included.len(),
            snippets = walk.snippets.len(),
            "composed skill"
        );
        Ok(ComposedDocument {
            text,
            included: walk.included,
            snippets: walk.snippets,
            variables: walk.variables,
        })
    }

    /// Resolve a skill by name from the source.
    pub fn resolve_named(&self, name: &str) -> Result<ComposedDocument> {
        let skill = self
            .source
            .skill(name)
            .ok_or_else(|| SwError::SkillNotFound(name.to_string()))?;
        self.resolve(skill)
    }

    fn expand(&self, skill: &SkillDefinition, depth: usize, walk: &mut Walk) -> Result<String> {
        walk.chain.push(skill.name.clone());
        for (name, spec) in &skill.variables {
            walk.variables
                .entry(name.clone())
                .or_insert_with(|| spec.clone());
        }

        let mut text = self.expand_text(&skill.body, skill, depth, walk)?;
        if let Some(append) = skill.append.as_deref().filter(|a| !a.trim().is_empty()) {
            let appended = self.expand_text(append, skill, depth, walk)?;
            let base = text.trim_end_matches('\n').len();
            text.truncate(base);
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&appended);
        }

        walk.chain.pop();
        Ok(text)
    }

    fn expand_text(
        &self,
        text: &str,
        skill: &SkillDefinition,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<String> {
        if memchr::memmem::find(text.as_bytes(), DIRECTIVE.as_bytes()).is_none() {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut fence: Option<&str> = None;
        for line in text.split_inclusive('\n') {
            let trimmed = line.trim_start();
            if let Some(marker) = fence_marker(trimmed) {
                match fence {
                    Some(open) if marker == open => fence = None,
                    None => fence = Some(marker),
                    Some(_) => {}
                }
                out.push_str(line);
                continue;
            }
            let target = match fence {
                None => parse_directive(line),
                Some(_) => None,
            };
            let Some(target) = target else {
                out.push_str(line);
                continue;
            };

            let spliced = match &target {
                IncludeTarget::Skill(name) => self.include_skill(name, skill, depth, walk)?,
                IncludeTarget::Path(path) => self.include_snippet(path, &target, skill, walk)?,
            };
            out.push_str(spliced.trim_end_matches('\n'));
            if line.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn include_skill(
        &self,
        name: &str,
        including: &SkillDefinition,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<String> {
        if walk.chain.iter().any(|ancestor| ancestor == name) {
            let mut chain = walk.chain.clone();
            chain.push(name.to_string());
            return Err(SwError::Cycle { chain });
        }
        if depth >= self.max_depth {
            return Err(SwError::DepthExceeded {
                skill: including.name.clone(),
                depth: depth + 1,
                limit: self.max_depth,
            });
        }
        let child = self
            .source
            .skill(name)
            .ok_or_else(|| SwError::IncludeNotFound {
                reference: format!("{SKILL_PREFIX}{name}"),
                including: including.name.clone(),
            })?;
        if !walk.included.iter().any(|n| n == name) {
            walk.included.push(name.to_string());
        }
        self.expand(child, depth + 1, walk)
    }

    fn include_snippet(
        &self,
        path: &str,
        target: &IncludeTarget,
        including: &SkillDefinition,
        walk: &mut Walk,
    ) -> Result<String> {
        if !including.security.allows_resource("file") {
            return Err(SwError::SecurityViolation(format!(
                "skill {} does not allow file includes ({path})",
                including.name
            )));
        }
        let not_found = || SwError::IncludeNotFound {
            reference: target.reference(),
            including: including.name.clone(),
        };
        let base = including.source_dir.as_deref().ok_or_else(not_found)?;
        let root = including.root.as_deref().unwrap_or(base);
        let resolved = resolve_confined(base, path, root)?.ok_or_else(not_found)?;
        if !resolved.is_file() {
            return Err(not_found());
        }
        let content = std::fs::read_to_string(&resolved)?;
        walk.snippets.push(resolved);
        Ok(content)
    }
}
