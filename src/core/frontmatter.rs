//! `SKILL.md` parsing: YAML front matter followed by a markdown body

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::skill::{
    Dependency, LocalOverride, Precedence, Scope, SecurityPolicy, SkillDefinition, VariableSpec,
    DEFAULT_CATEGORY, DEFAULT_PRIORITY, DEFAULT_VERSION,
};
use crate::error::{SwError, Result};

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A---[ \t]*\r?\n(?s:(.*?))\r?\n---[ \t]*(?:\r?\n|\z)").expect("valid regex")
});

/// Split a document into `(front matter, body)`. Documents without front
/// matter return `None` for the first element.
#[must_use]
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    FRONTMATTER_RE.captures(content).map_or((None, content), |caps| {
        let yaml = caps.get(1).map_or("", |m| m.as_str());
        let end = caps.get(0).map_or(0, |m| m.end());
        (Some(yaml), &content[end..])
    })
}

/// Front matter as written; `precedence` stays optional so the layer a skill
/// was discovered in can supply it.
#[derive(Debug, Deserialize)]
struct RawSkill {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    variables: BTreeMap<String, VariableSpec>,
    #[serde(default)]
    scope: Option<Scope>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    precedence: Option<String>,
    #[serde(default)]
    security: SecurityPolicy,
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

/// Parse a skill document. `layer` is used when the front matter does not
/// declare a precedence.
pub fn parse_skill(content: &str, source: &Path, layer: Precedence) -> Result<SkillDefinition> {
    let (yaml, body) = split_frontmatter(content);
    let yaml = yaml.ok_or_else(|| {
        SwError::InvalidSkill(format!("{}: missing YAML front matter", source.display()))
    })?;
    let raw: RawSkill = serde_yaml::from_str(yaml)
        .map_err(|err| SwError::InvalidSkill(format!("{}: {err}", source.display())))?;

    let priority = match raw.priority {
        None => DEFAULT_PRIORITY,
        Some(value) => u8::try_from(value)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| {
                SwError::InvalidSkill(format!(
                    "{}: priority {value} outside 0..=100",
                    source.display()
                ))
            })?,
    };
    let precedence = match raw.precedence.as_deref() {
        Some(value) => value
            .parse()
            .map_err(|err| SwError::InvalidSkill(format!("{}: {err}", source.display())))?,
        None => layer,
    };

    let mut tags = Vec::with_capacity(raw.tags.len());
    for tag in raw.tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(SkillDefinition {
        name: raw.name.trim().to_string(),
        description: raw.description.trim().to_string(),
        tags,
        category: raw.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        version: raw.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        variables: raw.variables,
        scope: raw.scope.filter(|scope| !scope.is_empty()),
        priority,
        precedence,
        security: raw.security,
        dependencies: raw.dependencies,
        body: body.to_string(),
        append: None,
        source_dir: source.parent().map(Path::to_path_buf),
        root: None,
    })
}

/// Parse a `SKILL.local.md` override. The body, when non-blank, becomes the
/// append fragment unless the front matter sets `append` explicitly.
pub fn parse_override(content: &str, source: &Path) -> Result<LocalOverride> {
    let (yaml, body) = split_frontmatter(content);
    let mut local: LocalOverride = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)
            .map_err(|err| SwError::InvalidSkill(format!("{}: {err}", source.display())))?,
        _ => LocalOverride::default(),
    };
    if local.append.is_none() && !body.trim().is_empty() {
        local.append = Some(body.trim_end().to_string());
    }
    if let Some(priority) = local.priority {
        if priority > 100 {
            return Err(SwError::InvalidSkill(format!(
                "{}: priority {priority} outside 0..=100",
                source.display()
            )));
        }
    }
    Ok(local)
}
