//! Skill definitions and local overrides
//!
//! A [`SkillDefinition`] is the parsed form of a `SKILL.md` file: YAML front
//! matter for metadata plus the raw markdown body. A [`LocalOverride`] is the
//! partial sibling document (`SKILL.local.md`) that customizes a base skill.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SwError, Result};

/// Configuration layer a skill was defined in.
///
/// Ordering follows specificity: `Organization < Repository < Project < User < Local`.
/// The more specific layer wins ties and shadows less specific definitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    Organization,
    Repository,
    #[default]
    Project,
    User,
    Local,
}

impl Precedence {
    pub const ALL: [Self; 5] = [
        Self::Organization,
        Self::Repository,
        Self::Project,
        Self::User,
        Self::Local,
    ];

    /// 0 for organization up to 4 for local.
    #[must_use]
    pub const fn specificity(self) -> u8 {
        match self {
            Self::Organization => 0,
            Self::Repository => 1,
            Self::Project => 2,
            Self::User => 3,
            Self::Local => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Repository => "repository",
            Self::Project => "project",
            Self::User => "user",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precedence {
    type Err = SwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "organization" | "org" => Ok(Self::Organization),
            "repository" | "repo" => Ok(Self::Repository),
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            "local" => Ok(Self::Local),
            other => Err(SwError::InvalidSkill(format!(
                "unknown precedence {other:?} (expected organization|repository|project|user|local)"
            ))),
        }
    }
}

/// Type of a template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    String,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "float")]
    Number,
}

impl VariableKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
        }
    }

    /// Whether `value` is of this kind. Integers are also valid numbers.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
        }
    }
}

/// Declared template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(rename = "type", alias = "kind")]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableSpec {
    #[must_use]
    pub const fn new(kind: VariableKind) -> Self {
        Self {
            kind,
            default: None,
            allowed: None,
            min: None,
            max: None,
            required: false,
            description: None,
        }
    }

    /// Check a value against kind, enum and range constraints.
    ///
    /// Returns the reason on failure; never coerces.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if !self.kind.accepts(value) {
            return Err(format!(
                "expected {}, got {}",
                self.kind.as_str(),
                json_kind(value)
            ));
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|candidate| values_equal(candidate, value)) {
                let options = allowed
                    .iter()
                    .map(display_value)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(format!(
                    "{} is not one of [{options}]",
                    display_value(value)
                ));
            }
        }
        if let Some(number) = value.as_f64() {
            if let Some(min) = self.min {
                if number < min {
                    return Err(format!("{number} is below minimum {min}"));
                }
            }
            if let Some(max) = self.max {
                if number > max {
                    return Err(format!("{number} is above maximum {max}"));
                }
            }
        }
        Ok(())
    }
}

/// Relevance scope declared by a skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

impl Scope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.languages.is_empty() && self.triggers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxLevel {
    Off,
    #[default]
    Standard,
    Strict,
}

/// Resource and execution policy attached to a skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Resource kinds the skill may pull in (e.g. `file`, `network`). Empty allows all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_commands: Vec<String>,
    #[serde(default)]
    pub sandbox: SandboxLevel,
}

impl SecurityPolicy {
    #[must_use]
    pub fn allows_resource(&self, kind: &str) -> bool {
        self.allowed_resources.is_empty()
            || self
                .allowed_resources
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default = "default_version_req")]
    pub version: String,
}

fn default_version_req() -> String {
    "*".to_string()
}

pub const DEFAULT_PRIORITY: u8 = 50;
pub const DEFAULT_VERSION: &str = "0.1.0";
pub const DEFAULT_CATEGORY: &str = "general";

/// A named unit of knowledge: metadata plus raw body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub precedence: Precedence,
    #[serde(default)]
    pub security: SecurityPolicy,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Markdown body with `@include` directives and `{% if %}` blocks.
    #[serde(skip)]
    pub body: String,
    /// Fragment contributed by a local override, appended after the body.
    #[serde(skip)]
    pub append: Option<String>,
    /// Directory holding `SKILL.md`; snippet includes resolve against it.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
    /// Skill root the definition was discovered under.
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

const fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl SkillDefinition {
    /// Minimal definition with defaults for every optional field.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            category: default_category(),
            version: default_version(),
            variables: BTreeMap::new(),
            scope: None,
            priority: DEFAULT_PRIORITY,
            precedence: Precedence::default(),
            security: SecurityPolicy::default(),
            dependencies: Vec::new(),
            body: String::new(),
            append: None,
            source_dir: None,
            root: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, spec: VariableSpec) -> Self {
        self.variables.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn triggers(&self) -> &[String] {
        self.scope.as_ref().map_or(&[], |scope| scope.triggers.as_slice())
    }

    /// Text fed to the lexical index: metadata plus the full body.
    #[must_use]
    pub fn lexical_text(&self) -> String {
        let mut text = String::with_capacity(self.body.len() + 256);
        text.push_str(&self.name.replace(['-', '_'], " "));
        text.push('\n');
        text.push_str(&self.description);
        text.push('\n');
        text.push_str(&self.tags.join(" "));
        text.push('\n');
        text.push_str(&self.category);
        text.push('\n');
        text.push_str(&self.triggers().join(" "));
        text.push('\n');
        text.push_str(&self.body);
        text
    }

    /// Text fed to the embedder: description, tags, triggers and a body excerpt.
    #[must_use]
    pub fn embedding_text(&self, excerpt_chars: usize) -> String {
        let excerpt: String = self.body.chars().take(excerpt_chars).collect();
        format!(
            "{}\n{}\n{}\n{}",
            self.description,
            self.tags.join(" "),
            self.triggers().join(" "),
            excerpt.trim()
        )
    }
}

/// Partial sibling document customizing a base skill.
///
/// Object-valued fields are kept as raw JSON so that a partial object merges
/// key-by-key into the base instead of replacing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precedence: Option<Precedence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<String>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Numbers compare numerically so `3` and `3.0` are equal.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

/// Render a value the way it appears in document text.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
