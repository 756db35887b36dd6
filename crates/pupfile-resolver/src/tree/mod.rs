//! Dependency tree builder.
//!
//! Walks depth-first from the declared root modules through their transitive
//! dependencies, fetching release metadata through the shared cache,
//! accumulating one [`Requirement`] per discovered edge, and checking for
//! resolution-path cycles before expanding each branch. After the walk,
//! every distinct module's aggregated requirement set is judged against its
//! published versions and any conflict is attached to that module's nodes.
//!
//! The walk never fails as a whole: fetch failures mark the affected branch
//! errored and siblings continue, Git-sourced modules are reported as
//! informational without conflict status, and cancellation returns the
//! partially built tree as-is.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pupfile_core::error::PupfileResult;
use pupfile_core::types::{
    canonical_format, compare_versions, parse_constraint, parse_constraint_tokens, ModuleRecord,
    ModuleSource, ParsedConstraint, ReleaseMetadata, VersionRequirement,
};
use pupfile_registry::cache::{MetadataCache, DEFAULT_WARM_CONCURRENCY};
use pupfile_registry::forge::ReleaseSource;
use pupfile_registry::git::GitMetadataSource;

use crate::conflict::{analyze_module, check_for_circular_dependencies, Conflict, Requirement};
use crate::range::intersect;

/// Lifecycle of one module visit, reported through the progress stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitState {
    Pending,
    FetchingVersions,
    FetchingDependencies,
    Resolved,
    Conflicted,
    Errored,
}

/// One progress event: a module transitioned to a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub module: String,
    pub state: VisitState,
}

/// How a node entered the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Resolved against Forge releases
    Forge,
    /// Declared against a Git repository; never range-resolved
    Git,
    /// A Git module's declared dependency, shown for information only
    Informational,
}

/// One node of the built tree. Owned exclusively by the tree returned to
/// the caller; no back-references, even when the requirement graph is
/// cyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Canonical module key
    pub module: String,
    pub resolved_version: Option<String>,
    pub children: Vec<DependencyNode>,
    pub conflict: Option<Conflict>,
    pub kind: NodeKind,
}

impl DependencyNode {
    fn unresolved(module: &str, kind: NodeKind) -> Self {
        Self {
            module: module.to_string(),
            resolved_version: None,
            children: Vec::new(),
            conflict: None,
            kind,
        }
    }
}

/// The built dependency tree handed to the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyTree {
    pub roots: Vec<DependencyNode>,
}

impl DependencyTree {
    /// All nodes in depth-first order
    pub fn modules(&self) -> Vec<&DependencyNode> {
        let mut nodes = Vec::new();
        let mut stack: Vec<&DependencyNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.iter().rev());
        }
        nodes
    }

    /// Every conflict attached anywhere in the tree
    pub fn conflicts(&self) -> Vec<&Conflict> {
        self.modules()
            .into_iter()
            .filter_map(|node| node.conflict.as_ref())
            .collect()
    }

    /// First node for a canonical module key, in depth-first order
    pub fn find_module(&self, canonical_key: &str) -> Option<&DependencyNode> {
        self.modules()
            .into_iter()
            .find(|node| node.module == canonical_key)
    }
}

/// Tuning knobs for a tree build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Upper bound on simultaneous fetches while warming root metadata
    pub warm_concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            warm_concurrency: DEFAULT_WARM_CONCURRENCY,
        }
    }
}

/// Builds dependency trees from manifest records.
///
/// Holds the shared metadata cache and the Git metadata collaborator; the
/// requirement state built during one walk is owned by that walk alone.
pub struct TreeBuilder<F, G> {
    cache: Arc<MetadataCache<F>>,
    git: G,
    options: BuildOptions,
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl<F: ReleaseSource, G: GitMetadataSource> TreeBuilder<F, G> {
    pub fn new(cache: Arc<MetadataCache<F>>, git: G) -> Self {
        Self {
            cache,
            git,
            options: BuildOptions::default(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this builder's walk when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to per-module state transitions. Call before `build`.
    pub fn progress_events(&mut self) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress = Some(tx);
        rx
    }

    fn emit(&self, module: &str, state: VisitState) {
        if let Some(progress) = &self.progress {
            let _ = progress.send(ProgressEvent {
                module: module.to_string(),
                state,
            });
        }
    }

    /// Build the dependency tree for a set of manifest records.
    ///
    /// The only hard error is a record with no recognizable module name;
    /// everything else — fetch failures, conflicts, cycles — is isolated to
    /// the affected subtree and reported as node state.
    pub async fn build(&self, records: &[ModuleRecord]) -> PupfileResult<DependencyTree> {
        for record in records {
            record.validate()?;
        }

        // Warm root metadata up front so the walk mostly hits the cache
        let forge_keys: Vec<String> = records
            .iter()
            .filter(|record| record.source == ModuleSource::Forge)
            .map(|record| canonical_format(&record.name))
            .collect();
        self.cache
            .warm(&forge_keys, self.options.warm_concurrency, &self.cancel)
            .await;

        let mut requirements: HashMap<String, Vec<Requirement>> = HashMap::new();
        let mut roots = Vec::new();

        for record in records {
            if self.cancel.is_cancelled() {
                tracing::debug!("tree build cancelled, returning partial tree");
                break;
            }
            match &record.source {
                ModuleSource::Git { url, git_ref, tag } => {
                    let node = self
                        .visit_git(record, url, git_ref.as_deref(), tag.as_deref())
                        .await;
                    roots.push(node);
                }
                ModuleSource::Forge => {
                    let module = canonical_format(&record.name);
                    let pinned = exact_pin(record);
                    if let Some(constraint) = &record.version {
                        requirements.entry(module.clone()).or_default().push(
                            Requirement::new(constraint.clone(), "Puppetfile", Vec::new(), true),
                        );
                    }
                    let node = self
                        .visit_forge(&module, pinned, &[], &mut requirements)
                        .await;
                    roots.push(node);
                }
            }
        }

        // Judge every distinct module's aggregated requirement set
        let mut conflicts: HashMap<String, Conflict> = HashMap::new();
        for (module, module_reqs) in &requirements {
            if self.cancel.is_cancelled() {
                break;
            }
            let Ok(releases) = self.cache.release_list(module).await else {
                // Fetch already failed during the walk; the node is errored
                continue;
            };
            let available = versions_descending(&releases);
            let analysis = analyze_module(module, module_reqs, &available);
            if let Some(conflict) = analysis.conflict {
                conflicts.insert(module.clone(), conflict);
            }
        }
        for root in &mut roots {
            annotate_conflicts(root, &conflicts);
        }

        Ok(DependencyTree { roots })
    }

    /// Visit one Forge module: resolve its effective version, then recurse
    /// into that version's declared dependencies with an extended path.
    fn visit_forge<'a>(
        &'a self,
        module: &'a str,
        pinned: Option<&'a str>,
        path: &'a [String],
        requirements: &'a mut HashMap<String, Vec<Requirement>>,
    ) -> Pin<Box<dyn Future<Output = DependencyNode> + Send + 'a>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return DependencyNode::unresolved(module, NodeKind::Forge);
            }

            self.emit(module, VisitState::FetchingVersions);
            let releases = match self.cache.release_list(module).await {
                Ok(releases) => releases,
                Err(error) => {
                    tracing::warn!(module, %error, "version fetch failed, branch errored");
                    self.emit(module, VisitState::Errored);
                    return DependencyNode::unresolved(module, NodeKind::Forge);
                }
            };

            let Some(version) = self.effective_version(module, pinned, &releases, requirements)
            else {
                // Nothing satisfies the requirements accumulated so far; the
                // post-walk analysis attaches the conflict to this node
                self.emit(module, VisitState::Conflicted);
                return DependencyNode::unresolved(module, NodeKind::Forge);
            };

            self.emit(module, VisitState::FetchingDependencies);
            let release = releases
                .iter()
                .find(|release| compare_versions(&release.version, &version) == Ordering::Equal)
                .cloned();

            let mut extended = path.to_vec();
            extended.push(module.to_string());

            let mut children = Vec::new();
            if let Some(release) = release {
                for dep in &release.dependencies {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let dep_module = canonical_format(&dep.name);

                    if let Some(conflict) =
                        check_for_circular_dependencies(&dep_module, &extended)
                    {
                        self.emit(&dep_module, VisitState::Conflicted);
                        let mut node = DependencyNode::unresolved(&dep_module, NodeKind::Forge);
                        node.conflict = Some(conflict);
                        children.push(node);
                        continue;
                    }

                    requirements.entry(dep_module.clone()).or_default().push(
                        Requirement::new(
                            dep.version_requirement.clone(),
                            module.to_string(),
                            extended.clone(),
                            false,
                        ),
                    );
                    children.push(
                        self.visit_forge(&dep_module, None, &extended, requirements)
                            .await,
                    );
                }
            }

            self.emit(module, VisitState::Resolved);
            DependencyNode {
                module: module.to_string(),
                resolved_version: Some(version),
                children,
                conflict: None,
                kind: NodeKind::Forge,
            }
        })
    }

    /// Pinned version if the manifest fixed one, else the highest version
    /// satisfying every requirement accumulated so far
    fn effective_version(
        &self,
        module: &str,
        pinned: Option<&str>,
        releases: &[ReleaseMetadata],
        requirements: &HashMap<String, Vec<Requirement>>,
    ) -> Option<String> {
        if let Some(pin) = pinned {
            return Some(pin.to_string());
        }

        let parsed: Vec<VersionRequirement> = requirements
            .get(module)
            .map(|module_reqs| {
                module_reqs
                    .iter()
                    .flat_map(|req| parse_constraint(&req.constraint))
                    .collect()
            })
            .unwrap_or_default();

        let range = intersect(&parsed)?;
        versions_descending(releases)
            .into_iter()
            .find(|version| range.contains(version))
    }

    /// Visit a Git-sourced module. Git references are not semantically
    /// ordered, so no range resolution happens: declared dependencies become
    /// informational children only and the node never carries a conflict.
    async fn visit_git(
        &self,
        record: &ModuleRecord,
        url: &str,
        git_ref: Option<&str>,
        tag: Option<&str>,
    ) -> DependencyNode {
        let module = canonical_format(&record.name);
        self.emit(&module, VisitState::FetchingVersions);

        let node = match self.git.fetch_metadata(url, git_ref, tag).await {
            Some(metadata) => {
                let children = metadata
                    .dependencies
                    .iter()
                    .map(|dep| {
                        DependencyNode::unresolved(
                            &canonical_format(&dep.name),
                            NodeKind::Informational,
                        )
                    })
                    .collect();
                DependencyNode {
                    module,
                    resolved_version: Some(metadata.version.clone()),
                    children,
                    conflict: None,
                    kind: NodeKind::Git,
                }
            }
            None => DependencyNode::unresolved(&module, NodeKind::Git),
        };

        self.emit(&node.module, VisitState::Resolved);
        node
    }
}

/// The manifest pins a version only when its text is a single bare version;
/// anything else is constraint text and goes through range resolution
fn exact_pin(record: &ModuleRecord) -> Option<&str> {
    let version = record.version.as_deref()?;
    match parse_constraint_tokens(version).as_slice() {
        [ParsedConstraint::Exact { .. }] => Some(version),
        _ => None,
    }
}

fn versions_descending(releases: &[ReleaseMetadata]) -> Vec<String> {
    let mut versions: Vec<String> = releases
        .iter()
        .map(|release| release.version.clone())
        .collect();
    versions.sort_by(|a, b| compare_versions(b, a));
    versions
}

fn annotate_conflicts(node: &mut DependencyNode, conflicts: &HashMap<String, Conflict>) {
    if node.kind == NodeKind::Forge && node.conflict.is_none() {
        if let Some(conflict) = conflicts.get(&node.module) {
            node.conflict = Some(conflict.clone());
        }
    }
    for child in &mut node.children {
        annotate_conflicts(child, conflicts);
    }
}

#[cfg(test)]
mod tests;
