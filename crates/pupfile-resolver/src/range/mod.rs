//! Requirement intersection into version ranges.
//!
//! A set of operator/version requirements folds into at most one lower and
//! one upper bound. An empty intersection is represented as "no range"
//! (`None`), never as a degenerate range: when both bounds are present,
//! `min ≤ max` holds, and equal bounds are both inclusive.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use pupfile_core::types::{compare_versions, ConstraintOp, VersionRequirement};

/// One end of a version range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBound {
    pub version: String,
    pub inclusive: bool,
}

impl RangeBound {
    fn new(version: &str, inclusive: bool) -> Self {
        Self {
            version: version.to_string(),
            inclusive,
        }
    }
}

/// The intersection of a requirement set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: Option<RangeBound>,
    pub max: Option<RangeBound>,
}

impl VersionRange {
    /// Check whether a version falls inside this range
    pub fn contains(&self, version: &str) -> bool {
        if let Some(min) = &self.min {
            match compare_versions(version, &min.version) {
                Ordering::Less => return false,
                Ordering::Equal if !min.inclusive => return false,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match compare_versions(version, &max.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !max.inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

/// Fold requirements into a single satisfiable range, or prove none exists.
///
/// Lower bounds keep the larger version (the stricter exclusivity on ties);
/// upper bounds keep the smaller symmetrically. An `=` requirement is
/// checked against the bounds accumulated so far — if it violates either,
/// the intersection is empty immediately; otherwise it collapses the range
/// to exactly that version.
pub fn intersect(requirements: &[VersionRequirement]) -> Option<VersionRange> {
    let mut min: Option<RangeBound> = None;
    let mut max: Option<RangeBound> = None;

    for req in requirements {
        match req.op {
            ConstraintOp::GtEq | ConstraintOp::Gt => {
                let candidate = RangeBound::new(&req.version, req.op == ConstraintOp::GtEq);
                min = Some(match min.take() {
                    None => candidate,
                    Some(current) => tighter_lower(current, candidate),
                });
            }
            ConstraintOp::LtEq | ConstraintOp::Lt => {
                let candidate = RangeBound::new(&req.version, req.op == ConstraintOp::LtEq);
                max = Some(match max.take() {
                    None => candidate,
                    Some(current) => tighter_upper(current, candidate),
                });
            }
            ConstraintOp::Eq => {
                if let Some(lower) = &min {
                    match compare_versions(&req.version, &lower.version) {
                        Ordering::Less => return None,
                        Ordering::Equal if !lower.inclusive => return None,
                        _ => {}
                    }
                }
                if let Some(upper) = &max {
                    match compare_versions(&req.version, &upper.version) {
                        Ordering::Greater => return None,
                        Ordering::Equal if !upper.inclusive => return None,
                        _ => {}
                    }
                }
                min = Some(RangeBound::new(&req.version, true));
                max = Some(RangeBound::new(&req.version, true));
            }
        }
    }

    // Final validity: min ≤ max, and equal bounds must both be inclusive
    if let (Some(lower), Some(upper)) = (&min, &max) {
        match compare_versions(&lower.version, &upper.version) {
            Ordering::Greater => return None,
            Ordering::Equal if !(lower.inclusive && upper.inclusive) => return None,
            _ => {}
        }
    }

    Some(VersionRange { min, max })
}

fn tighter_lower(current: RangeBound, candidate: RangeBound) -> RangeBound {
    match compare_versions(&candidate.version, &current.version) {
        Ordering::Greater => candidate,
        Ordering::Equal if !candidate.inclusive => candidate,
        _ => current,
    }
}

fn tighter_upper(current: RangeBound, candidate: RangeBound) -> RangeBound {
    match compare_versions(&candidate.version, &current.version) {
        Ordering::Less => candidate,
        Ordering::Equal if !candidate.inclusive => candidate,
        _ => current,
    }
}

/// Filter candidate versions by the intersected range, preserving the
/// supplied order. Intersecting once keeps this linear in candidates rather
/// than candidates × requirements.
pub fn find_satisfying_versions(
    available: &[String],
    requirements: &[VersionRequirement],
) -> Vec<String> {
    let Some(range) = intersect(requirements) else {
        return Vec::new();
    };
    available
        .iter()
        .filter(|version| range.contains(version))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pupfile_core::types::parse_constraint;

    fn reqs(constraint: &str) -> Vec<VersionRequirement> {
        parse_constraint(constraint)
    }

    #[test]
    fn test_intersect_simple_window() {
        let range = intersect(&reqs(">= 6.0.0 < 9.0.0")).unwrap();
        assert_eq!(range.min, Some(RangeBound::new("6.0.0", true)));
        assert_eq!(range.max, Some(RangeBound::new("9.0.0", false)));
    }

    #[test]
    fn test_intersect_tightens_bounds() {
        let mut all = reqs(">= 1.0.0 < 9.0.0");
        all.extend(reqs(">= 2.0.0 < 5.0.0"));
        let range = intersect(&all).unwrap();
        assert_eq!(range.min, Some(RangeBound::new("2.0.0", true)));
        assert_eq!(range.max, Some(RangeBound::new("5.0.0", false)));
    }

    #[test]
    fn test_intersect_stricter_exclusivity_wins_on_ties() {
        let mut all = reqs(">= 2.0.0");
        all.extend(reqs("> 2.0.0"));
        let range = intersect(&all).unwrap();
        assert_eq!(range.min, Some(RangeBound::new("2.0.0", false)));

        let mut all = reqs("<= 3.0.0");
        all.extend(reqs("< 3.0.0"));
        let range = intersect(&all).unwrap();
        assert_eq!(range.max, Some(RangeBound::new("3.0.0", false)));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let mut all = reqs(">= 6.0.0 < 7.0.0");
        all.extend(reqs(">= 7.0.0"));
        assert!(intersect(&all).is_none());
    }

    #[test]
    fn test_intersect_touching_exclusive_bounds_is_empty() {
        let mut all = reqs("> 2.0.0");
        all.extend(reqs("< 2.0.0"));
        assert!(intersect(&all).is_none());

        let mut all = reqs(">= 2.0.0");
        all.extend(reqs("< 2.0.0"));
        assert!(intersect(&all).is_none());
    }

    #[test]
    fn test_intersect_touching_inclusive_bounds_is_single_version() {
        let mut all = reqs(">= 2.0.0");
        all.extend(reqs("<= 2.0.0"));
        let range = intersect(&all).unwrap();
        assert!(range.contains("2.0.0"));
        assert!(!range.contains("2.0.1"));
    }

    #[test]
    fn test_exact_collapses_range() {
        let mut all = reqs(">= 1.0.0 < 3.0.0");
        all.extend(reqs("2.1.0"));
        let range = intersect(&all).unwrap();
        assert_eq!(range.min, Some(RangeBound::new("2.1.0", true)));
        assert_eq!(range.max, Some(RangeBound::new("2.1.0", true)));
    }

    #[test]
    fn test_exact_outside_accumulated_bounds_is_empty() {
        let mut all = reqs(">= 2.0.0");
        all.extend(reqs("1.0.0"));
        assert!(intersect(&all).is_none());

        let mut all = reqs("< 2.0.0");
        all.extend(reqs("2.0.0"));
        assert!(intersect(&all).is_none());
    }

    #[test]
    fn test_exact_on_exclusive_boundary_is_empty() {
        let mut all = reqs("> 2.0.0");
        all.extend(reqs("2.0.0"));
        assert!(intersect(&all).is_none());
    }

    #[test]
    fn test_empty_requirements_is_unbounded() {
        let range = intersect(&[]).unwrap();
        assert!(range.min.is_none());
        assert!(range.max.is_none());
        assert!(range.contains("0.0.1"));
        assert!(range.contains("99.0.0"));
    }

    #[test]
    fn test_contains_respects_exclusivity() {
        let range = intersect(&reqs("> 1.0.0 <= 2.0.0")).unwrap();
        assert!(!range.contains("1.0.0"));
        assert!(range.contains("1.0.1"));
        assert!(range.contains("2.0.0"));
        assert!(!range.contains("2.0.1"));
    }

    #[test]
    fn test_find_satisfying_versions() {
        let available: Vec<String> = ["7.9.0", "8.0.0", "8.5.0", "9.0.0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let satisfying = find_satisfying_versions(&available, &reqs(">= 8.0.0 < 9.0.0"));
        assert_eq!(satisfying, vec!["8.0.0".to_string(), "8.5.0".to_string()]);
    }

    #[test]
    fn test_find_satisfying_versions_empty_intersection() {
        let available: Vec<String> = vec!["1.0.0".to_string()];
        let mut all = reqs(">= 2.0.0");
        all.extend(reqs("< 1.0.0"));
        assert!(find_satisfying_versions(&available, &all).is_empty());
    }
}
