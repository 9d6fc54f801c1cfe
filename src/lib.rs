//! skillweave - hybrid retrieval and composition engine for skill documents
//!
//! Skills are markdown documents with YAML front matter. The engine indexes
//! them lexically (BM25) and semantically (injected embedder), fuses both
//! rankings, detects ambiguous matches, and resolves the chosen skill by
//! expanding `@include` directives, applying local overrides, and rendering
//! variables.

pub mod app;
pub mod cli;
pub mod compose;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod search;
pub mod security;
pub mod test_utils;

pub use engine::{
    AmbiguousResult, ResolvedSkill, SearchHit, SearchResults, SkillEngine, SkillMetadata,
    UseOutcome, UseRequest,
};
pub use error::{Result, SwError};
