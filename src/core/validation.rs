//! Skill validation

use semver::{Version, VersionReq};
use serde::Serialize;

use super::skill::SkillDefinition;
use crate::error::{SwError, Result};

const MAX_NAME_LENGTH: usize = 64;

/// Validate a skill definition.
///
/// Hard invariant violations are errors; softer quality issues come back as
/// warnings for the caller to report.
pub fn validate(skill: &SkillDefinition) -> Result<Vec<ValidationWarning>> {
    let mut warnings = vec![];

    validate_name(&skill.name)?;

    if skill.priority > 100 {
        return Err(SwError::ValidationFailed(format!(
            "{}: priority {} outside 0..=100",
            skill.name, skill.priority
        )));
    }

    for dep in &skill.dependencies {
        if dep.name.trim().is_empty() {
            return Err(SwError::ValidationFailed(format!(
                "{}: dependency name is required",
                skill.name
            )));
        }
        VersionReq::parse(&dep.version).map_err(|err| {
            SwError::ValidationFailed(format!(
                "{}: dependency {} has invalid version constraint {:?}: {err}",
                skill.name, dep.name, dep.version
            ))
        })?;
    }

    for (var_name, spec) in &skill.variables {
        if let (Some(min), Some(max)) = (spec.min, spec.max) {
            if min > max {
                return Err(SwError::ValidationFailed(format!(
                    "{}: variable {var_name} has min {min} > max {max}",
                    skill.name
                )));
            }
        }
        if let Some(default) = &spec.default {
            spec.check(default).map_err(|reason| {
                SwError::ValidationFailed(format!(
                    "{}: default for variable {var_name} is invalid: {reason}",
                    skill.name
                ))
            })?;
        }
    }

    if skill.description.is_empty() {
        warnings.push(ValidationWarning {
            field: "description".to_string(),
            message: "skill should have a description".to_string(),
        });
    }

    if skill.tags.is_empty() {
        warnings.push(ValidationWarning {
            field: "tags".to_string(),
            message: "skill should have at least one tag".to_string(),
        });
    }

    if Version::parse(&skill.version).is_err() {
        warnings.push(ValidationWarning {
            field: "version".to_string(),
            message: format!("version {:?} is not valid semver", skill.version),
        });
    }

    Ok(warnings)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SwError::ValidationFailed("skill name is required".into()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(SwError::ValidationFailed(format!(
            "skill name {name:?} exceeds {MAX_NAME_LENGTH} characters"
        )));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid || name.starts_with('-') || name.ends_with('-') {
        return Err(SwError::ValidationFailed(format!(
            "skill name {name:?} must contain only lowercase letters, digits and inner hyphens"
        )));
    }
    Ok(())
}

/// A validation warning (not an error)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}
