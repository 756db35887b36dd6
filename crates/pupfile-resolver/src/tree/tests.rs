use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pupfile_core::error::PupfileError;
use pupfile_core::types::{GitModuleMetadata, ModuleDependency, ModuleRecord, ReleaseMetadata};
use pupfile_registry::cache::MetadataCache;
use pupfile_registry::forge::ReleaseSource;
use pupfile_registry::git::GitMetadataSource;
use pupfile_registry::RegistryResult;

use super::*;
use crate::conflict::ConflictKind;

/// In-memory release source keyed by canonical module name
struct MapSource {
    modules: HashMap<String, Vec<ReleaseMetadata>>,
    calls: AtomicUsize,
}

impl MapSource {
    fn new(modules: &[(&str, Vec<ReleaseMetadata>)]) -> Self {
        Self {
            modules: modules
                .iter()
                .map(|(key, releases)| (key.to_string(), releases.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ReleaseSource for MapSource {
    async fn fetch_releases(&self, canonical_key: &str) -> RegistryResult<Vec<ReleaseMetadata>> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.modules
            .get(canonical_key)
            .cloned()
            .ok_or_else(|| PupfileError::ModuleNotFound {
                name: canonical_key.to_string(),
            })
    }
}

struct NoGit;

impl GitMetadataSource for NoGit {
    async fn fetch_metadata(
        &self,
        _repo_url: &str,
        _git_ref: Option<&str>,
        _tag: Option<&str>,
    ) -> Option<GitModuleMetadata> {
        None
    }
}

struct StaticGit(GitModuleMetadata);

impl GitMetadataSource for StaticGit {
    async fn fetch_metadata(
        &self,
        _repo_url: &str,
        _git_ref: Option<&str>,
        _tag: Option<&str>,
    ) -> Option<GitModuleMetadata> {
        Some(self.0.clone())
    }
}

fn release(version: &str, deps: &[(&str, &str)]) -> ReleaseMetadata {
    ReleaseMetadata::new(
        version,
        deps.iter()
            .map(|(name, requirement)| ModuleDependency {
                name: name.to_string(),
                version_requirement: requirement.to_string(),
            })
            .collect(),
    )
}

fn builder(source: MapSource) -> TreeBuilder<MapSource, NoGit> {
    TreeBuilder::new(Arc::new(MetadataCache::new(source)), NoGit)
}

fn stdlib_releases() -> Vec<ReleaseMetadata> {
    vec![
        release("9.0.0", &[]),
        release("8.5.0", &[]),
        release("8.0.0", &[]),
    ]
}

#[tokio::test]
async fn test_resolves_transitive_chain_to_highest_satisfying() {
    let source = MapSource::new(&[
        (
            "puppetlabs-apache",
            vec![release(
                "5.0.0",
                &[("puppetlabs/stdlib", ">= 8.0.0 < 9.0.0")],
            )],
        ),
        ("puppetlabs-stdlib", stdlib_releases()),
    ]);
    let builder = builder(source);
    let records = vec![ModuleRecord::forge("puppetlabs/apache", None)];

    let tree = builder.build(&records).await.unwrap();

    assert_eq!(tree.roots.len(), 1);
    let apache = &tree.roots[0];
    assert_eq!(apache.module, "puppetlabs-apache");
    assert_eq!(apache.resolved_version.as_deref(), Some("5.0.0"));
    assert_eq!(apache.kind, NodeKind::Forge);

    let stdlib = &apache.children[0];
    assert_eq!(stdlib.module, "puppetlabs-stdlib");
    assert_eq!(stdlib.resolved_version.as_deref(), Some("8.5.0"));
    assert!(tree.conflicts().is_empty());
}

#[tokio::test]
async fn test_pinned_version_is_respected() {
    let source = MapSource::new(&[("puppetlabs-stdlib", stdlib_releases())]);
    let builder = builder(source);
    let records = vec![ModuleRecord::forge(
        "puppetlabs/stdlib",
        Some("8.0.0".to_string()),
    )];

    let tree = builder.build(&records).await.unwrap();
    assert_eq!(tree.roots[0].resolved_version.as_deref(), Some("8.0.0"));
}

#[tokio::test]
async fn test_constraint_text_resolves_within_range() {
    let source = MapSource::new(&[("puppetlabs-stdlib", stdlib_releases())]);
    let builder = builder(source);
    let records = vec![ModuleRecord::forge(
        "puppetlabs/stdlib",
        Some(">= 8.0.0 < 9.0.0".to_string()),
    )];

    let tree = builder.build(&records).await.unwrap();
    assert_eq!(tree.roots[0].resolved_version.as_deref(), Some("8.5.0"));
}

#[tokio::test]
async fn test_disjoint_requirements_produce_conflict_not_error() {
    let source = MapSource::new(&[
        (
            "acme-a",
            vec![release("1.0.0", &[("puppetlabs/stdlib", "< 8.0.0")])],
        ),
        (
            "acme-b",
            vec![release("1.0.0", &[("puppetlabs/stdlib", ">= 9.0.0")])],
        ),
        (
            "puppetlabs-stdlib",
            vec![release("9.0.0", &[]), release("8.5.0", &[]), release("7.0.0", &[])],
        ),
    ]);
    let builder = builder(source);
    let records = vec![
        ModuleRecord::forge("acme/a", None),
        ModuleRecord::forge("acme/b", None),
    ];

    let tree = builder.build(&records).await.unwrap();

    let conflicts = tree.conflicts();
    assert!(!conflicts.is_empty());
    assert!(conflicts
        .iter()
        .all(|conflict| conflict.kind == ConflictKind::NoIntersection));

    // Both roots still resolved; only the contested module is marked
    assert!(tree.roots.iter().all(|root| root.resolved_version.is_some()));
    let stdlib = tree.find_module("puppetlabs-stdlib").unwrap();
    assert!(stdlib.conflict.is_some());
}

#[tokio::test]
async fn test_circular_graph_terminates_with_circular_conflict() {
    let source = MapSource::new(&[
        ("acme-a", vec![release("1.0.0", &[("acme/b", ">= 1.0.0")])]),
        ("acme-b", vec![release("1.0.0", &[("acme/a", ">= 1.0.0")])]),
    ]);
    let builder = builder(source);
    let records = vec![ModuleRecord::forge("acme/a", None)];

    let tree = builder.build(&records).await.unwrap();

    let b = &tree.roots[0].children[0];
    assert_eq!(b.module, "acme-b");
    assert_eq!(b.resolved_version.as_deref(), Some("1.0.0"));

    let revisited = &b.children[0];
    assert_eq!(revisited.module, "acme-a");
    assert!(revisited.resolved_version.is_none());
    assert!(revisited.children.is_empty());

    let conflict = revisited.conflict.as_ref().unwrap();
    assert_eq!(conflict.kind, ConflictKind::Circular);
    assert!(conflict.details.contains("acme-a -> acme-b -> acme-a"));
}

#[tokio::test]
async fn test_fetch_failure_isolates_branch() {
    let source = MapSource::new(&[("puppetlabs-stdlib", stdlib_releases())]);
    let builder = builder(source);
    let records = vec![
        ModuleRecord::forge("missing/module", None),
        ModuleRecord::forge("puppetlabs/stdlib", None),
    ];

    let tree = builder.build(&records).await.unwrap();

    let missing = &tree.roots[0];
    assert!(missing.resolved_version.is_none());
    assert!(missing.children.is_empty());
    assert!(missing.conflict.is_none());

    let stdlib = &tree.roots[1];
    assert_eq!(stdlib.resolved_version.as_deref(), Some("9.0.0"));
}

#[tokio::test]
async fn test_shared_dependency_aggregates_requirements() {
    let source = MapSource::new(&[
        (
            "acme-a",
            vec![release("1.0.0", &[("puppetlabs/stdlib", ">= 8.0.0")])],
        ),
        (
            "acme-b",
            vec![release("1.0.0", &[("puppetlabs/stdlib", "< 9.0.0")])],
        ),
        ("puppetlabs-stdlib", stdlib_releases()),
    ]);
    let cache = Arc::new(MetadataCache::new(source));
    let builder = TreeBuilder::new(Arc::clone(&cache), NoGit);
    let records = vec![
        ModuleRecord::forge("acme/a", None),
        ModuleRecord::forge("acme/b", None),
    ];

    let tree = builder.build(&records).await.unwrap();

    assert!(tree.conflicts().is_empty());
    let stdlib_nodes: Vec<_> = tree
        .modules()
        .into_iter()
        .filter(|node| node.module == "puppetlabs-stdlib")
        .collect();
    assert_eq!(stdlib_nodes.len(), 2);
    assert!(stdlib_nodes
        .iter()
        .all(|node| node.resolved_version.is_some()));

    // One fetch per module across warm and walk
    assert_eq!(cache.stats().modules, 3);
}

#[tokio::test]
async fn test_git_module_children_are_informational() {
    let source = MapSource::new(&[]);
    let git = StaticGit(GitModuleMetadata {
        name: "acme/gitmod".to_string(),
        version: "2.0.0".to_string(),
        dependencies: vec![ModuleDependency {
            name: "puppetlabs/stdlib".to_string(),
            version_requirement: ">= 8.0.0".to_string(),
        }],
    });
    let builder = TreeBuilder::new(Arc::new(MetadataCache::new(source)), git);
    let records = vec![ModuleRecord::git(
        "acme/gitmod",
        "https://github.com/acme/gitmod.git",
        None,
        Some("v2.0.0".to_string()),
    )];

    let tree = builder.build(&records).await.unwrap();

    let root = &tree.roots[0];
    assert_eq!(root.kind, NodeKind::Git);
    assert_eq!(root.resolved_version.as_deref(), Some("2.0.0"));
    assert!(root.conflict.is_none());

    assert_eq!(root.children.len(), 1);
    let child = &root.children[0];
    assert_eq!(child.kind, NodeKind::Informational);
    assert_eq!(child.module, "puppetlabs-stdlib");
    assert!(child.children.is_empty());
    assert!(tree.conflicts().is_empty());
}

#[tokio::test]
async fn test_git_module_without_metadata_is_bare_node() {
    let source = MapSource::new(&[]);
    let builder = TreeBuilder::new(Arc::new(MetadataCache::new(source)), NoGit);
    let records = vec![ModuleRecord::git(
        "acme/gitmod",
        "https://github.com/acme/gitmod.git",
        Some("main".to_string()),
        None,
    )];

    let tree = builder.build(&records).await.unwrap();

    let root = &tree.roots[0];
    assert_eq!(root.kind, NodeKind::Git);
    assert!(root.resolved_version.is_none());
    assert!(root.children.is_empty());
    assert!(root.conflict.is_none());
}

#[tokio::test]
async fn test_cancelled_build_returns_partial_tree() {
    let source = MapSource::new(&[("puppetlabs-stdlib", stdlib_releases())]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let builder = builder(source).with_cancellation(cancel);
    let records = vec![ModuleRecord::forge("puppetlabs/stdlib", None)];

    let tree = builder.build(&records).await.unwrap();
    assert!(tree.roots.is_empty());
}

#[tokio::test]
async fn test_invalid_module_name_is_hard_error() {
    let source = MapSource::new(&[]);
    let builder = builder(source);
    let records = vec![ModuleRecord::forge("", None)];

    let error = builder.build(&records).await.unwrap_err();
    assert!(matches!(error, PupfileError::InvalidModuleName { .. }));
}

#[tokio::test]
async fn test_progress_events_report_visit_lifecycle() {
    let source = MapSource::new(&[
        (
            "puppetlabs-apache",
            vec![release("5.0.0", &[("puppetlabs/stdlib", ">= 8.0.0")])],
        ),
        ("puppetlabs-stdlib", stdlib_releases()),
    ]);
    let mut builder = builder(source);
    let mut events = builder.progress_events();
    let records = vec![ModuleRecord::forge("puppetlabs/apache", None)];

    builder.build(&records).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&ProgressEvent {
        module: "puppetlabs-apache".to_string(),
        state: VisitState::FetchingVersions,
    }));
    assert!(seen.contains(&ProgressEvent {
        module: "puppetlabs-apache".to_string(),
        state: VisitState::Resolved,
    }));
    assert!(seen.contains(&ProgressEvent {
        module: "puppetlabs-stdlib".to_string(),
        state: VisitState::Resolved,
    }));
}

#[tokio::test]
async fn test_find_module_walks_depth_first() {
    let source = MapSource::new(&[
        (
            "puppetlabs-apache",
            vec![release("5.0.0", &[("puppetlabs/stdlib", ">= 8.0.0")])],
        ),
        ("puppetlabs-stdlib", stdlib_releases()),
    ]);
    let builder = builder(source);
    let records = vec![ModuleRecord::forge("puppetlabs/apache", None)];

    let tree = builder.build(&records).await.unwrap();

    let modules: Vec<&str> = tree
        .modules()
        .iter()
        .map(|node| node.module.as_str())
        .collect();
    assert_eq!(modules, vec!["puppetlabs-apache", "puppetlabs-stdlib"]);
    assert!(tree.find_module("puppetlabs-stdlib").is_some());
    assert!(tree.find_module("acme-unknown").is_none());
}
