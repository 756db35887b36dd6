//! Manifest record and release metadata types.
//!
//! The resolution engine never parses Puppetfile text itself; a manifest
//! source collaborator supplies already-parsed [`ModuleRecord`]s. Release
//! metadata is the unit cached per (module, version) and is produced either
//! by the Forge API or by reading a Git repository's `metadata.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PupfileError, PupfileResult};
use crate::types::module_name::ModuleNameParts;

/// Where a declared module comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleSource {
    /// Published on the Puppet Forge
    Forge,
    /// Declared against a Git repository
    Git {
        url: String,
        git_ref: Option<String>,
        tag: Option<String>,
    },
}

/// One module declaration from the manifest, as supplied by the manifest
/// source collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    /// Pinned version or constraint text, when the manifest fixed one
    pub version: Option<String>,
    pub source: ModuleSource,
}

impl ModuleRecord {
    /// Create a Forge-sourced record
    pub fn forge(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
            source: ModuleSource::Forge,
        }
    }

    /// Create a Git-sourced record
    pub fn git(
        name: impl Into<String>,
        url: impl Into<String>,
        git_ref: Option<String>,
        tag: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: None,
            source: ModuleSource::Git {
                url: url.into(),
                git_ref,
                tag,
            },
        }
    }

    /// A record with no recognizable name is the one hard error the engine
    /// surfaces back to the manifest source
    pub fn validate(&self) -> PupfileResult<ModuleNameParts> {
        let parts = ModuleNameParts::parse(&self.name);
        if parts.name.is_empty() {
            return Err(PupfileError::InvalidModuleName {
                name: self.name.clone(),
            });
        }
        Ok(parts)
    }
}

/// One dependency declared by a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub name: String,
    pub version_requirement: String,
}

/// Metadata for one published release: the unit cached per (module, version)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub version: String,
    pub created_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<ModuleDependency>,
}

impl ReleaseMetadata {
    pub fn new(version: impl Into<String>, dependencies: Vec<ModuleDependency>) -> Self {
        Self {
            version: version.into(),
            created_at: None,
            dependencies,
        }
    }
}

/// Metadata read from a Git repository's `metadata.json`, or unavailable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitModuleMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
}
