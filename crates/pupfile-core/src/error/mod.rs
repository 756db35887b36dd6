//! Error types and result aliases for Pupfile operations.
//!
//! Provides a unified error type that covers the error conditions across the
//! Pupfile crates with actionable error messages. Version conflicts are
//! deliberately *not* represented here: a conflict is structured data
//! attached to the dependency tree, never an error.

use thiserror::Error;

/// Unified error type for all Pupfile operations
#[derive(Error, Debug)]
pub enum PupfileError {
    // Registry errors
    #[error("Module '{name}' not found on the Forge")]
    ModuleNotFound { name: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Manifest errors
    #[error("Module declaration '{name}' has no recognizable module name")]
    InvalidModuleName { name: String },

    // Metadata errors
    #[error("No release metadata for {module} version {version}")]
    MetadataMissing { module: String, version: String },
}

/// Result type alias for Pupfile operations
pub type PupfileResult<T> = Result<T, PupfileError>;

impl PupfileError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PupfileError::Network { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PupfileError::ModuleNotFound { .. } => {
                Some("Check the module name spelling or search the Forge for the right slug")
            }
            PupfileError::Network { .. } => Some("Check your internet connection and try again"),
            PupfileError::InvalidModuleName { .. } => {
                Some("Module names must be 'owner/name', 'owner-name', or a bare name")
            }
            _ => None,
        }
    }
}
