//! Skill registry: the loaded `{name -> definition}` and `{name -> override}` maps
//!
//! Skills live in directories containing `SKILL.md`; an optional
//! `SKILL.local.md` next to it is the local override. Roots are scanned per
//! precedence layer and a more specific layer shadows a less specific one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::frontmatter::{parse_override, parse_skill};
use super::overlay::{apply_override, merge};
use super::skill::{LocalOverride, Precedence, SkillDefinition};
use super::validation::{ValidationWarning, validate};
use crate::error::{SwError, Result};

pub const SKILL_FILE: &str = "SKILL.md";
pub const LOCAL_OVERRIDE_FILE: &str = "SKILL.local.md";

/// A directory scanned for skills, tagged with its layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRoot {
    pub path: PathBuf,
    pub layer: Precedence,
}

impl SkillRoot {
    pub fn new(path: impl Into<PathBuf>, layer: Precedence) -> Self {
        Self {
            path: path.into(),
            layer,
        }
    }
}

/// Immutable set of loaded skills and their overrides
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, SkillDefinition>,
    overrides: BTreeMap<String, LocalOverride>,
    warnings: Vec<(String, ValidationWarning)>,
}

impl SkillRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already-parsed definitions.
    ///
    /// Fails on duplicate names, invalid definitions (before or after the
    /// override is merged), or overrides that have no base skill.
    pub fn from_parts<S, O>(skills: S, overrides: O) -> Result<Self>
    where
        S: IntoIterator<Item = SkillDefinition>,
        O: IntoIterator<Item = (String, LocalOverride)>,
    {
        let mut registry = Self::new();
        for skill in skills {
            let warnings = validate(&skill)?;
            if registry.skills.contains_key(&skill.name) {
                return Err(SwError::InvalidSkill(format!(
                    "duplicate skill name {}",
                    skill.name
                )));
            }
            registry
                .warnings
                .extend(warnings.into_iter().map(|w| (skill.name.clone(), w)));
            registry.skills.insert(skill.name.clone(), skill);
        }
        for (name, local) in overrides {
            let Some(base) = registry.skills.get(&name) else {
                return Err(SwError::InvalidSkill(format!(
                    "local override for unknown skill {name}"
                )));
            };
            let warnings = validate_merged(base, &local, &format!("local override for {name}"))?;
            registry.replace_warnings(&name, warnings);
            registry.overrides.insert(name, local);
        }
        Ok(registry)
    }

    /// Discover and parse every skill under the given roots.
    pub fn load(roots: &[SkillRoot]) -> Result<Self> {
        let start = std::time::Instant::now();
        let mut registry = Self::new();
        let mut layers: BTreeMap<String, (Precedence, PathBuf)> = BTreeMap::new();

        for root in roots {
            if !root.path.is_dir() {
                debug!(path = %root.path.display(), "skill root does not exist, skipping");
                continue;
            }
            for entry in WalkDir::new(&root.path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(std::result::Result::ok)
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy();
                if file_name == LOCAL_OVERRIDE_FILE {
                    let sibling = entry.path().with_file_name(SKILL_FILE);
                    if !sibling.is_file() {
                        warn!(path = %entry.path().display(), "local override without base skill, ignoring");
                    }
                    continue;
                }
                if file_name != SKILL_FILE {
                    continue;
                }
                registry.load_skill_file(entry.path(), root, &mut layers)?;
            }
        }

        info!(
            skills = registry.skills.len(),
            overrides = registry.overrides.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "loaded skill registry"
        );
        Ok(registry)
    }

    fn load_skill_file(
        &mut self,
        path: &Path,
        root: &SkillRoot,
        layers: &mut BTreeMap<String, (Precedence, PathBuf)>,
    ) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| SwError::InvalidSkill(format!("read {}: {err}", path.display())))?;
        let mut skill = parse_skill(&content, path, root.layer)?;
        skill.root = Some(root.path.clone());
        let mut warnings = validate(&skill)
            .map_err(|err| SwError::InvalidSkill(format!("{}: {err}", path.display())))?;

        if let Some((existing_layer, existing_path)) = layers.get(&skill.name) {
            if *existing_layer == root.layer {
                return Err(SwError::InvalidSkill(format!(
                    "duplicate skill name {} in {} layer ({} and {})",
                    skill.name,
                    root.layer,
                    existing_path.display(),
                    path.display()
                )));
            }
            if *existing_layer > root.layer {
                warn!(
                    skill = %skill.name,
                    kept = %existing_path.display(),
                    shadowed = %path.display(),
                    "skill shadowed by more specific layer"
                );
                return Ok(());
            }
            warn!(
                skill = %skill.name,
                kept = %path.display(),
                shadowed = %existing_path.display(),
                "skill shadowed by more specific layer"
            );
            self.overrides.remove(&skill.name);
            self.warnings.retain(|(name, _)| name != &skill.name);
        }

        let override_path = path.with_file_name(LOCAL_OVERRIDE_FILE);
        if override_path.is_file() {
            let raw = std::fs::read_to_string(&override_path).map_err(|err| {
                SwError::InvalidSkill(format!("read {}: {err}", override_path.display()))
            })?;
            let local = parse_override(&raw, &override_path)?;
            warnings = validate_merged(&skill, &local, &override_path.display().to_string())?;
            debug!(skill = %skill.name, "attached local override");
            self.overrides.insert(skill.name.clone(), local);
        }

        layers.insert(skill.name.clone(), (root.layer, path.to_path_buf()));
        self.warnings
            .extend(warnings.into_iter().map(|w| (skill.name.clone(), w)));
        self.skills.insert(skill.name.clone(), skill);
        Ok(())
    }

    fn replace_warnings(&mut self, name: &str, warnings: Vec<ValidationWarning>) {
        self.warnings.retain(|(skill, _)| skill != name);
        self.warnings
            .extend(warnings.into_iter().map(|w| (name.to_string(), w)));
    }

    /// Base definition, without the local override applied.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SkillDefinition> {
        self.skills.get(name)
    }

    #[must_use]
    pub fn override_for(&self, name: &str) -> Option<&LocalOverride> {
        self.overrides.get(name)
    }

    /// Definition with its local override merged in.
    pub fn effective(&self, name: &str) -> Result<SkillDefinition> {
        let base = self
            .get(name)
            .ok_or_else(|| SwError::SkillNotFound(name.to_string()))?;
        apply_override(base, self.override_for(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkillDefinition> {
        self.skills.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    #[must_use]
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Validation warnings collected while loading, keyed by skill name.
    #[must_use]
    pub fn warnings(&self) -> &[(String, ValidationWarning)] {
        &self.warnings
    }
}

/// Validate `base` with `local` merged in; `origin` names the override in errors.
fn validate_merged(
    base: &SkillDefinition,
    local: &LocalOverride,
    origin: &str,
) -> Result<Vec<ValidationWarning>> {
    let merged = merge(base, local)?;
    validate(&merged).map_err(|err| SwError::InvalidSkill(format!("{origin}: {err}")))
}
