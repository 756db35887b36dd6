//! Conflict analysis for module requirement sets.
//!
//! A conflict is structured data, not an exception: the tree builder attaches
//! [`Conflict`] values to nodes and keeps walking. Three kinds exist — the
//! requirements admit no common range, the range is satisfiable but no
//! published version falls inside it, or a resolution path revisits itself.

use serde::{Deserialize, Serialize};

use pupfile_core::types::{parse_constraint, VersionRequirement};

use crate::range::intersect;

/// One version constraint imposed on a module by a specific edge in the
/// dependency graph. Created once per discovered edge; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Raw constraint text as declared
    pub constraint: String,
    /// Module that imposes this constraint
    pub imposed_by: String,
    /// Module identifiers from the resolution root to the imposing module
    pub path: Vec<String>,
    /// Whether this came straight from the manifest
    pub is_direct: bool,
}

impl Requirement {
    pub fn new(
        constraint: impl Into<String>,
        imposed_by: impl Into<String>,
        path: Vec<String>,
        is_direct: bool,
    ) -> Self {
        Self {
            constraint: constraint.into(),
            imposed_by: imposed_by.into(),
            path,
            is_direct,
        }
    }
}

/// What kind of conflict was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// The imposed requirements admit no common version range
    NoIntersection,
    /// The range is satisfiable in the abstract, but no published version
    /// falls inside it
    NoAvailableVersion,
    /// A resolution path revisits a module already on it
    Circular,
}

/// One proposed way out of a conflict.
///
/// `suggested_version: None` is the "none" sentinel: the fix proposes
/// removing or relaxing rather than picking a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub module: String,
    pub suggested_version: Option<String>,
    pub reason: String,
}

impl SuggestedFix {
    /// The suggested version, or the literal `"none"` sentinel
    pub fn suggested_version_label(&self) -> &str {
        self.suggested_version.as_deref().unwrap_or("none")
    }
}

/// A structured, non-exceptional resolution failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub details: String,
    pub suggested_fixes: Vec<SuggestedFix>,
}

/// Outcome of judging one module's aggregated requirement set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAnalysis {
    /// Versions satisfying every requirement, ordered as supplied
    pub satisfying_versions: Vec<String>,
    pub conflict: Option<Conflict>,
}

impl ModuleAnalysis {
    pub fn has_conflict(&self) -> bool {
        self.conflict.is_some()
    }
}

/// Judge a module's aggregated requirements against its available versions.
///
/// `available` is filtered in the order supplied; callers are expected to
/// have already sorted by preference (typically descending by version).
pub fn analyze_module(
    module_id: &str,
    requirements: &[Requirement],
    available_versions: &[String],
) -> ModuleAnalysis {
    let parsed: Vec<VersionRequirement> = requirements
        .iter()
        .flat_map(|req| parse_constraint(&req.constraint))
        .collect();

    let Some(range) = intersect(&parsed) else {
        let details = format!(
            "{}: no version satisfies all imposed requirements: {}",
            module_id,
            describe_requirements(requirements)
        );
        return ModuleAnalysis {
            satisfying_versions: Vec::new(),
            conflict: Some(Conflict {
                kind: ConflictKind::NoIntersection,
                details,
                suggested_fixes: fixes_for(module_id, requirements),
            }),
        };
    };

    let satisfying: Vec<String> = available_versions
        .iter()
        .filter(|version| range.contains(version))
        .cloned()
        .collect();

    if satisfying.is_empty() {
        let details = format!(
            "{}: requirements are mutually satisfiable but no published version falls in range: {}",
            module_id,
            describe_requirements(requirements)
        );
        return ModuleAnalysis {
            satisfying_versions: Vec::new(),
            conflict: Some(Conflict {
                kind: ConflictKind::NoAvailableVersion,
                details,
                suggested_fixes: fixes_for(module_id, requirements),
            }),
        };
    }

    ModuleAnalysis {
        satisfying_versions: satisfying,
        conflict: None,
    }
}

fn describe_requirements(requirements: &[Requirement]) -> String {
    requirements
        .iter()
        .map(|req| format!("'{}' (via {})", req.constraint, req.imposed_by))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One fix per distinct imposing module, in first-seen order.
///
/// This is a heuristic suggestion, not a proof: the manifest's own entry is
/// offered a different version, transitive imposers a relaxed constraint.
fn fixes_for(module_id: &str, requirements: &[Requirement]) -> Vec<SuggestedFix> {
    let mut seen: Vec<&str> = Vec::new();
    let mut fixes = Vec::new();

    for req in requirements {
        if seen.contains(&req.imposed_by.as_str()) {
            continue;
        }
        seen.push(&req.imposed_by);

        let reason = if req.is_direct {
            format!(
                "try a different version for the {} entry (currently '{}')",
                module_id, req.constraint
            )
        } else {
            format!(
                "relax the constraint '{}' that {} places on {}",
                req.constraint, req.imposed_by, module_id
            )
        };
        fixes.push(SuggestedFix {
            module: req.imposed_by.clone(),
            suggested_version: None,
            reason,
        });
    }

    fixes
}

/// Detect whether expanding `module_id` would revisit the resolution path.
///
/// `path` runs from the root to the module currently being expanded; the
/// module being visited is not yet appended. The suggested fix removes the
/// last module on the path — the most recently added edge. That is a
/// heuristic break point, not a minimal one.
pub fn check_for_circular_dependencies(module_id: &str, path: &[String]) -> Option<Conflict> {
    let first = path.iter().position(|module| module == module_id)?;

    let mut segment: Vec<String> = path[first..].to_vec();
    segment.push(module_id.to_string());
    let cycle = segment.join(" -> ");

    // position() returned Some, so path is non-empty
    let break_module = path.last()?.clone();

    Some(Conflict {
        kind: ConflictKind::Circular,
        details: format!("Circular dependency detected: {}", cycle),
        suggested_fixes: vec![SuggestedFix {
            module: break_module.clone(),
            suggested_version: None,
            reason: format!("removing {} breaks the circular reference", break_module),
        }],
    })
}
