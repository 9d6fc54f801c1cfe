//! Document composition: include expansion and variable rendering

pub mod includes;
pub mod template;

pub use includes::{
    ComposedDocument, CompositionResolver, DEFAULT_MAX_DEPTH, IncludeTarget, SkillSource,
    parse_directive,
};
pub use template::{Values, render, render_with, resolve_values};

/// Opening or closing marker of a fenced code block, for a line with its
/// indentation already stripped.
pub(crate) fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}
