//! Git repository metadata collaborator.
//!
//! Modules declared against a Git repository publish their `metadata.json`
//! at the repository root. This client rewrites the repository URL to the
//! host's raw-file endpoint and reads that one file; it never clones. Every
//! failure is downgraded to "metadata unavailable" — the tree builder treats
//! Git modules as informational, so a broken repository must never abort a
//! resolution.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use url::Url;

use pupfile_core::types::GitModuleMetadata;

/// Anything that can look up a Git module's `metadata.json`.
///
/// Returns `None` when the metadata is unavailable for any reason.
pub trait GitMetadataSource: Send + Sync {
    fn fetch_metadata(
        &self,
        repo_url: &str,
        git_ref: Option<&str>,
        tag: Option<&str>,
    ) -> impl Future<Output = Option<GitModuleMetadata>> + Send;
}

/// HTTP reader for raw `metadata.json` files
#[derive(Debug, Clone)]
pub struct GitMetadataClient {
    client: Client,
}

impl GitMetadataClient {
    pub fn new() -> Option<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .user_agent("pupfile/0.1.0")
            .build()
            .ok()?;
        Some(Self { client })
    }

    /// Fetch and parse a repository's `metadata.json`, or `None` if the URL
    /// is unsupported, the file is missing, or the fetch fails
    pub async fn fetch_metadata(
        &self,
        repo_url: &str,
        git_ref: Option<&str>,
        tag: Option<&str>,
    ) -> Option<GitModuleMetadata> {
        // Tags are more specific than refs when both are declared
        let refspec = tag.or(git_ref).unwrap_or("HEAD");

        let Some(raw_url) = raw_metadata_url(repo_url, refspec) else {
            tracing::warn!(url = repo_url, "unsupported Git URL, skipping metadata");
            return None;
        };

        match self.try_fetch(&raw_url).await {
            Ok(metadata) => Some(metadata),
            Err(message) => {
                tracing::warn!(
                    url = %raw_url,
                    error = %message,
                    "failed to read Git module metadata"
                );
                None
            }
        }
    }

    async fn try_fetch(&self, raw_url: &str) -> Result<GitModuleMetadata, String> {
        let response = self
            .client
            .get(raw_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }

        response
            .json::<GitModuleMetadata>()
            .await
            .map_err(|e| e.to_string())
    }
}

impl GitMetadataSource for GitMetadataClient {
    async fn fetch_metadata(
        &self,
        repo_url: &str,
        git_ref: Option<&str>,
        tag: Option<&str>,
    ) -> Option<GitModuleMetadata> {
        GitMetadataClient::fetch_metadata(self, repo_url, git_ref, tag).await
    }
}

/// Rewrite a repository URL to the raw `metadata.json` URL for a refspec.
///
/// Knows the raw-file layouts of github.com and gitlab.com; any other HTTP
/// host falls back to `<repo>/raw/<refspec>/metadata.json`.
fn raw_metadata_url(repo_url: &str, refspec: &str) -> Option<String> {
    // Normalize scp-style SSH remotes: git@github.com:owner/repo.git
    let normalized = if let Some(rest) = repo_url.strip_prefix("git@") {
        format!("https://{}", rest.replacen(':', "/", 1))
    } else {
        repo_url.to_string()
    };

    let parsed = Url::parse(&normalized).ok()?;
    let host = parsed.host_str()?;
    let repo_path = parsed.path().trim_matches('/').trim_end_matches(".git");
    if repo_path.is_empty() {
        return None;
    }

    let raw = match host {
        "github.com" => format!(
            "https://raw.githubusercontent.com/{repo_path}/{refspec}/metadata.json"
        ),
        "gitlab.com" => format!("https://gitlab.com/{repo_path}/-/raw/{refspec}/metadata.json"),
        _ => {
            let base = normalized.trim_end_matches('/').trim_end_matches(".git");
            format!("{base}/raw/{refspec}/metadata.json")
        }
    };
    Some(raw)
}
