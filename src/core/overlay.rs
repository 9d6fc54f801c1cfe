//! Local override merging
//!
//! A local override customizes a shared skill without touching the shared
//! file. Merge rules per field:
//!
//! - scalars (`description`, `category`, `version`, `priority`, `precedence`): override replaces base
//! - lists (`tags`, `dependencies`): base then override, de-duplicated keeping first occurrence
//! - objects (`scope`, `security`, `variables`): recursive key-wise merge
//! - `append`: stored on the result and appended after the base body during composition
//!
//! Merging is idempotent: applying the same override twice gives the same
//! definition as applying it once.

use itertools::Itertools;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::skill::{LocalOverride, SkillDefinition};
use crate::error::{SwError, Result};

/// Result of applying an override to a skill
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverrideReport {
    pub skill: String,
    /// Fields that the override touched
    pub changes: Vec<String>,
}

/// Merge `local` into `base`, or return `base` unchanged when there is no override.
pub fn apply_override(
    base: &SkillDefinition,
    local: Option<&LocalOverride>,
) -> Result<SkillDefinition> {
    match local {
        Some(local) => merge(base, local),
        None => Ok(base.clone()),
    }
}

/// Merge an override into a base definition.
pub fn merge(base: &SkillDefinition, local: &LocalOverride) -> Result<SkillDefinition> {
    merge_with_report(base, local).map(|(merged, _)| merged)
}

/// Merge and report which fields changed.
pub fn merge_with_report(
    base: &SkillDefinition,
    local: &LocalOverride,
) -> Result<(SkillDefinition, OverrideReport)> {
    let mut merged = base.clone();
    let mut changes = Vec::new();

    if let Some(description) = &local.description {
        merged.description.clone_from(description);
        changes.push("description".to_string());
    }
    if let Some(category) = &local.category {
        merged.category.clone_from(category);
        changes.push("category".to_string());
    }
    if let Some(version) = &local.version {
        merged.version.clone_from(version);
        changes.push("version".to_string());
    }
    if let Some(priority) = local.priority {
        merged.priority = priority;
        changes.push("priority".to_string());
    }
    if let Some(precedence) = local.precedence {
        merged.precedence = precedence;
        changes.push("precedence".to_string());
    }

    if !local.tags.is_empty() {
        merged.tags = base
            .tags
            .iter()
            .chain(local.tags.iter())
            .cloned()
            .unique()
            .collect();
        changes.push("tags".to_string());
    }
    if !local.dependencies.is_empty() {
        merged.dependencies = base
            .dependencies
            .iter()
            .chain(local.dependencies.iter())
            .cloned()
            .unique()
            .collect();
        changes.push("dependencies".to_string());
    }

    if let Some(patch) = &local.scope {
        let base_scope = base.scope.clone().unwrap_or_default();
        let scope: super::skill::Scope = merge_object(&base_scope, patch, &base.name, "scope")?;
        merged.scope = (!scope.is_empty()).then_some(scope);
        changes.push("scope".to_string());
    }
    if let Some(patch) = &local.security {
        merged.security = merge_object(&base.security, patch, &base.name, "security")?;
        changes.push("security".to_string());
    }
    if let Some(patch) = &local.variables {
        merged.variables = merge_object(&base.variables, patch, &base.name, "variables")?;
        changes.push("variables".to_string());
    }

    if let Some(append) = &local.append {
        merged.append = Some(append.clone());
        changes.push("append".to_string());
    }

    let report = OverrideReport {
        skill: base.name.clone(),
        changes,
    };
    Ok((merged, report))
}

fn merge_object<T>(base: &T, patch: &Value, skill: &str, field: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(base)?;
    deep_merge(&mut value, patch);
    serde_json::from_value(value).map_err(|err| {
        SwError::InvalidSkill(format!("{skill}: local override for {field} is invalid: {err}"))
    })
}

/// Recursively merge `patch` into `base`. Keys in `patch` replace keys in
/// `base` at each nesting level; keys absent from `patch` are kept.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && patch_value.is_object() => {
                        deep_merge(existing, patch_value);
                    }
                    _ => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}
