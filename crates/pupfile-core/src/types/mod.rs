//! Core data types for Puppetfile dependency resolution.
//!
//! This module provides the fundamental types used throughout the Pupfile
//! crates:
//! - Version constraint parsing and comparison
//! - Module name normalization
//! - Manifest records and release metadata

pub mod manifest;
pub mod module_name;
pub mod version;

// Re-export all public types
pub use manifest::{
    GitModuleMetadata, ModuleDependency, ModuleRecord, ModuleSource, ReleaseMetadata,
};
pub use module_name::{are_equivalent, canonical_format, name_variants, ModuleNameParts};
pub use version::{
    compare_versions, parse_constraint, parse_constraint_tokens, satisfies, satisfies_all,
    ConstraintOp, ParsedConstraint, VersionRequirement,
};
