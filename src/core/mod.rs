//! Core skill types and logic

pub mod frontmatter;
pub mod overlay;
pub mod registry;
pub mod skill;
pub mod validation;

pub use overlay::{OverrideReport, apply_override, deep_merge, merge, merge_with_report};
pub use registry::{LOCAL_OVERRIDE_FILE, SKILL_FILE, SkillRegistry, SkillRoot};
pub use skill::{
    Dependency, LocalOverride, Precedence, SandboxLevel, Scope, SecurityPolicy, SkillDefinition,
    VariableKind, VariableSpec,
};
pub use validation::{ValidationWarning, validate};
