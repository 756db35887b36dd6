//! Version constraint parsing and comparison for Puppet module versions.
//!
//! Puppetfile constraints are free-form, whitespace-separated text mixing the
//! pessimistic operator (`~> 1.2.0`), wildcards (`1.x`), explicit operators
//! (`>= 1.0.0 < 2.0.0`), and bare versions. Parsing is deliberately
//! permissive: a malformed token degrades to an exact-version requirement on
//! the raw token instead of failing, so a partially broken Puppetfile still
//! resolves everything else. The fallback is a named [`ParsedConstraint`]
//! variant, distinguishable from a recognized form.
//!
//! Comparison is semver-like but not semver: components are compared
//! numerically with missing trailing components treated as zero, versions
//! with any non-numeric component fall back to lexical comparison of the
//! whole string, and pre-release suffixes compare lexically (so `beta.2` >
//! `beta.11`). Both limitations are intentional; downstream conflict
//! reporting depends on the existing ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator for version requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOp {
    /// `=` — exact match
    Eq,
    /// `>` — strictly greater
    Gt,
    /// `>=` — greater or equal
    GtEq,
    /// `<` — strictly less
    Lt,
    /// `<=` — less or equal
    LtEq,
}

impl ConstraintOp {
    /// Parse an operator token, if it is one
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Eq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtEq),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
        };
        f.write_str(s)
    }
}

/// A single operator/version requirement produced by constraint parsing.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRequirement {
    pub op: ConstraintOp,
    pub version: String,
}

impl VersionRequirement {
    pub fn new(op: ConstraintOp, version: impl Into<String>) -> Self {
        Self {
            op,
            version: version.into(),
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

/// One recognized constraint form from a Puppetfile constraint string.
///
/// The `Fallback` variant carries tokens the parser could not recognize;
/// they still behave as exact-version requirements on the raw text, but
/// callers can tell them apart from a successfully parsed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsedConstraint {
    /// `~> X.Y[.Z]` — allows upgrades below the next minor boundary
    Pessimistic { version: String },
    /// `N.x` or `N.x.x` — any version within the major series
    Wildcard { major: u64 },
    /// An explicit operator followed by a version token
    Explicit(VersionRequirement),
    /// A bare version token, treated as an exact match
    Exact { version: String },
    /// Malformed token kept as an exact-version requirement on the raw text
    Fallback { raw: String },
}

impl ParsedConstraint {
    /// Expand this constraint form into operator/version requirements
    pub fn requirements(&self) -> Vec<VersionRequirement> {
        match self {
            Self::Pessimistic { version } => {
                let lower = VersionRequirement::new(ConstraintOp::GtEq, version.clone());
                let upper = VersionRequirement::new(ConstraintOp::Lt, pessimistic_upper(version));
                vec![lower, upper]
            }
            Self::Wildcard { major } => vec![
                VersionRequirement::new(ConstraintOp::GtEq, format!("{major}.0.0")),
                VersionRequirement::new(ConstraintOp::Lt, format!("{}.0.0", major + 1)),
            ],
            Self::Explicit(req) => vec![req.clone()],
            Self::Exact { version } => {
                vec![VersionRequirement::new(ConstraintOp::Eq, version.clone())]
            }
            Self::Fallback { raw } => vec![VersionRequirement::new(ConstraintOp::Eq, raw.clone())],
        }
    }
}

/// Upper bound for the pessimistic operator: bump the second-from-rightmost
/// component and zero the rest. `~> 1.2.3` and `~> 1.2` both cap at `1.3.0`;
/// a lone major caps at the next major.
fn pessimistic_upper(version: &str) -> String {
    // Callers only build Pessimistic from versions with a numeric core
    let comps = numeric_components(version).unwrap_or_default();
    match comps.len() {
        0 => version.to_string(),
        1 => format!("{}.0.0", comps[0] + 1),
        _ => format!("{}.{}.0", comps[0], comps[1] + 1),
    }
}

/// Parse a free-form constraint string into its recognized forms.
///
/// Tokens are whitespace-separated; operators may also be glued to their
/// version (`>=1.0.0`). Anything unrecognizable becomes a `Fallback` token.
pub fn parse_constraint_tokens(input: &str) -> Vec<ParsedConstraint> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let mut parsed = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];

        // Detached operator: "~> 1.2.0", ">= 1.0.0"
        if token == "~>" {
            if let Some(next) = tokens.get(i + 1).filter(|t| is_version_token(t)) {
                parsed.push(ParsedConstraint::Pessimistic {
                    version: (*next).to_string(),
                });
                i += 2;
                continue;
            }
            // Operator with no usable version token
            let raw = tokens.get(i + 1).copied().unwrap_or(token);
            parsed.push(ParsedConstraint::Fallback {
                raw: raw.to_string(),
            });
            i += if tokens.get(i + 1).is_some() { 2 } else { 1 };
            continue;
        }
        if let Some(op) = ConstraintOp::from_token(token) {
            if let Some(next) = tokens.get(i + 1).filter(|t| is_version_token(t)) {
                parsed.push(ParsedConstraint::Explicit(VersionRequirement::new(
                    op,
                    (*next).to_string(),
                )));
                i += 2;
                continue;
            }
            let raw = tokens.get(i + 1).copied().unwrap_or(token);
            parsed.push(ParsedConstraint::Fallback {
                raw: raw.to_string(),
            });
            i += if tokens.get(i + 1).is_some() { 2 } else { 1 };
            continue;
        }

        // Glued operator: "~>1.2.0", ">=1.0.0"
        if let Some(rest) = token.strip_prefix("~>") {
            if is_version_token(rest) {
                parsed.push(ParsedConstraint::Pessimistic {
                    version: rest.to_string(),
                });
            } else {
                parsed.push(ParsedConstraint::Fallback {
                    raw: token.to_string(),
                });
            }
            i += 1;
            continue;
        }
        if let Some((op, rest)) = split_glued_operator(token) {
            if is_version_token(rest) {
                parsed.push(ParsedConstraint::Explicit(VersionRequirement::new(
                    op,
                    rest.to_string(),
                )));
            } else {
                parsed.push(ParsedConstraint::Fallback {
                    raw: token.to_string(),
                });
            }
            i += 1;
            continue;
        }

        if let Some(major) = wildcard_major(token) {
            parsed.push(ParsedConstraint::Wildcard { major });
        } else if is_version_token(token) {
            parsed.push(ParsedConstraint::Exact {
                version: token.to_string(),
            });
        } else {
            parsed.push(ParsedConstraint::Fallback {
                raw: token.to_string(),
            });
        }
        i += 1;
    }

    parsed
}

/// Parse a constraint string and flatten all forms into requirements
pub fn parse_constraint(input: &str) -> Vec<VersionRequirement> {
    parse_constraint_tokens(input)
        .iter()
        .flat_map(ParsedConstraint::requirements)
        .collect()
}

/// Split a token like ">=1.0.0" into its operator and version parts.
/// Two-character operators are matched before their one-character prefixes.
fn split_glued_operator(token: &str) -> Option<(ConstraintOp, &str)> {
    for (prefix, op) in [
        (">=", ConstraintOp::GtEq),
        ("<=", ConstraintOp::LtEq),
        (">", ConstraintOp::Gt),
        ("<", ConstraintOp::Lt),
        ("=", ConstraintOp::Eq),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some((op, rest));
            }
        }
    }
    None
}

/// Match `N.x` / `N.x.x` wildcards (case-insensitive `x`)
fn wildcard_major(token: &str) -> Option<u64> {
    let parts: Vec<&str> = token.split('.').collect();
    if !(parts.len() == 2 || parts.len() == 3) {
        return None;
    }
    let major = parts[0].parse().ok()?;
    if parts[1..].iter().all(|p| p.eq_ignore_ascii_case("x")) {
        Some(major)
    } else {
        None
    }
}

/// A token qualifies as a version when its dot-separated core is fully
/// numeric; an optional `-prerelease` suffix is allowed.
fn is_version_token(token: &str) -> bool {
    numeric_components(token).is_some()
}

/// Numeric components of a version's core, ignoring any `-prerelease` suffix.
/// Returns `None` when any component is non-numeric.
fn numeric_components(version: &str) -> Option<Vec<u64>> {
    let core = match version.split_once('-') {
        Some((core, _)) => core,
        None => version,
    };
    core.split('.').map(|c| c.parse().ok()).collect()
}

/// Split a version into its numeric core and optional pre-release suffix
fn split_prerelease(version: &str) -> (&str, Option<&str>) {
    match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    }
}

/// Compare two version strings with semantic-version-like ordering.
///
/// Missing trailing components compare as zero (`1.0` == `1.0.0`). A version
/// without a pre-release suffix is greater than the same numeric triple with
/// one (`1.0.0` > `1.0.0-beta`); two suffixes compare lexically. Versions
/// with non-numeric components fall back to lexical comparison of the whole
/// strings — a documented limitation, kept as-is.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = a.trim();
    let b = b.trim();

    let (a_core, a_pre) = split_prerelease(a);
    let (b_core, b_pre) = split_prerelease(b);

    let (a_comps, b_comps) = match (numeric_components(a_core), numeric_components(b_core)) {
        (Some(ac), Some(bc)) => (ac, bc),
        // Lexical fallback for non-numeric versions
        _ => return a.cmp(b),
    };

    let len = a_comps.len().max(b_comps.len());
    for i in 0..len {
        let left = a_comps.get(i).copied().unwrap_or(0);
        let right = b_comps.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    match (a_pre, b_pre) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        // Lexical suffix comparison: "beta.2" > "beta.11"
        (Some(x), Some(y)) => x.cmp(y),
    }
}

/// Check whether a version satisfies a single requirement
pub fn satisfies(version: &str, requirement: &VersionRequirement) -> bool {
    let ord = compare_versions(version, &requirement.version);
    match requirement.op {
        ConstraintOp::Eq => ord == Ordering::Equal,
        ConstraintOp::Gt => ord == Ordering::Greater,
        ConstraintOp::GtEq => ord != Ordering::Less,
        ConstraintOp::Lt => ord == Ordering::Less,
        ConstraintOp::LtEq => ord != Ordering::Greater,
    }
}

/// Check whether a version satisfies every requirement in a set
pub fn satisfies_all(version: &str, requirements: &[VersionRequirement]) -> bool {
    requirements.iter().all(|req| satisfies(version, req))
}
