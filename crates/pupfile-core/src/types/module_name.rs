//! Module name normalization and alias handling.
//!
//! Puppet module identifiers appear in several spellings: `owner/name`,
//! `owner-name`, or a bare `name`. All cache keys and equality checks use
//! the canonical lowercase `owner-name` form. One aliasing rule is handled:
//! modules published under `puppetlabs/puppet-X` are also known as
//! `puppet/X`, in both directions.

use serde::{Deserialize, Serialize};

/// Decomposed module identifier, recomputed on demand rather than stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNameParts {
    pub owner: String,
    pub name: String,
    pub full_name: String,
}

impl ModuleNameParts {
    /// Derive owner and name from any accepted spelling.
    ///
    /// Splits on the first `/` when present, else the first `-`; a bare name
    /// gets the owner `"unknown"`.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (owner, name) = if let Some((owner, name)) = input.split_once('/') {
            (owner, name)
        } else if let Some((owner, name)) = input.split_once('-') {
            (owner, name)
        } else {
            ("unknown", input)
        };

        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{owner}/{name}"),
        }
    }

    /// Canonical lowercase `owner-name` key used for caching and equality
    pub fn canonical(&self) -> String {
        format!("{}-{}", self.owner, self.name).to_lowercase()
    }
}

/// Map any accepted spelling to the canonical `owner-name` key
pub fn canonical_format(input: &str) -> String {
    ModuleNameParts::parse(input).canonical()
}

/// Enumerate the canonical keys this identifier is known under, including
/// itself. Covers the `puppetlabs/puppet-X` ⇄ `puppet/X` aliasing rule.
pub fn name_variants(input: &str) -> Vec<String> {
    let parts = ModuleNameParts::parse(input);
    let owner = parts.owner.to_lowercase();
    let name = parts.name.to_lowercase();

    let mut variants = vec![parts.canonical()];

    if owner == "puppetlabs" {
        if let Some(stripped) = name.strip_prefix("puppet-") {
            variants.push(format!("puppet-{stripped}"));
        }
    }
    if owner == "puppet" {
        variants.push(format!("puppetlabs-puppet-{name}"));
    }

    variants
}

/// Two identifiers are equivalent when their canonical forms match or any
/// of their aliasing variants do
pub fn are_equivalent(a: &str, b: &str) -> bool {
    let a_variants = name_variants(a);
    let b_variants = name_variants(b);
    a_variants.iter().any(|v| b_variants.contains(v))
}
