//! Puppet Forge client, Git metadata client, and metadata cache for the
//! Pupfile resolver.
//!
//! This crate provides the network collaborators the resolution engine
//! fetches through: a Forge HTTP client with connection pooling and retry
//! logic, a Git repository metadata reader, and a two-level metadata cache
//! that deduplicates concurrent fetches per module.

pub mod cache;
pub mod forge;
pub mod git;

// Re-export main types
pub use cache::{CacheStats, MetadataCache, DEFAULT_WARM_CONCURRENCY};
pub use forge::{ForgeClient, ReleaseSource, RetryConfig};
pub use git::{GitMetadataClient, GitMetadataSource};

use pupfile_core::error::PupfileError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, PupfileError>;
