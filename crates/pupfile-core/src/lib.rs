//! # pupfile-core
//!
//! Core types and utilities shared across all Pupfile crates.
//!
//! This crate provides:
//! - Version constraint parsing and comparison for Puppet module versions
//! - Module name normalization and alias handling
//! - Manifest record and release metadata types
//! - PupfileError enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (constraints, module names, manifest records)
//! - `error`: Error types and result aliases

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{PupfileError, PupfileResult};
pub use types::{
    are_equivalent, canonical_format, compare_versions, name_variants, parse_constraint,
    parse_constraint_tokens, satisfies, satisfies_all, ConstraintOp, GitModuleMetadata,
    ModuleDependency, ModuleNameParts, ModuleRecord, ModuleSource, ParsedConstraint,
    ReleaseMetadata, VersionRequirement,
};
