//! Dependency resolution engine for Puppetfile module graphs.
//!
//! This crate turns already-parsed manifest records into a dependency tree:
//! it intersects the version requirements every path imposes on a module,
//! judges satisfiability against the module's published releases, detects
//! resolution-path cycles, and isolates per-branch failures so one broken
//! module never aborts the whole build.

pub mod conflict;
pub mod range;
pub mod tree;

// Re-export main types
pub use conflict::{
    analyze_module, check_for_circular_dependencies, Conflict, ConflictKind, ModuleAnalysis,
    Requirement, SuggestedFix,
};
pub use range::{find_satisfying_versions, intersect, RangeBound, VersionRange};
pub use tree::{
    BuildOptions, DependencyNode, DependencyTree, NodeKind, ProgressEvent, TreeBuilder, VisitState,
};

use pupfile_core::error::PupfileError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, PupfileError>;
