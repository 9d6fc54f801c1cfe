//! Security features for skillweave (path confinement for includes).

pub mod path_policy;

pub use path_policy::{PathPolicyViolation, canonicalize_with_root, resolve_confined};
