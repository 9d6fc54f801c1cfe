//! Error types for skillweave

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SwError>;

#[derive(Error, Debug)]
pub enum SwError {
    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("include target {reference:?} not found (included from skill {including})")]
    IncludeNotFound { reference: String, including: String },

    #[error("include cycle detected: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("include depth exceeded in skill {skill}: depth {depth} reached limit {limit}")]
    DepthExceeded {
        skill: String,
        depth: usize,
        limit: usize,
    },

    #[error("variable {variable:?} failed validation: {reason}")]
    VariableValidation { variable: String, reason: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("semantic index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("ambiguous selection between: {}", candidates.join(", "))]
    AmbiguousSelection { candidates: Vec<String> },

    #[error("invalid skill: {0}")]
    InvalidSkill(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("security policy violation: {0}")]
    SecurityViolation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SwError {
    /// Stable machine-readable code for robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SkillNotFound(_) => "not_found",
            Self::IncludeNotFound { .. } => "include_not_found",
            Self::Cycle { .. } => "cycle",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::VariableValidation { .. } => "variable_validation",
            Self::Template(_) => "template",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::AmbiguousSelection { .. } => "ambiguous_selection",
            Self::InvalidSkill(_) => "invalid_skill",
            Self::ValidationFailed(_) => "validation_failed",
            Self::SecurityViolation(_) => "security_violation",
            Self::Config(_) | Self::MissingConfig(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
        }
    }

    /// Structural document errors abort a request and are never retried.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::IncludeNotFound { .. } | Self::Cycle { .. } | Self::DepthExceeded { .. }
        )
    }
}
