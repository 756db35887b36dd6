//! Puppet Forge HTTP client with connection pooling and retry logic

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};

use pupfile_core::error::PupfileError;
use pupfile_core::types::{ModuleDependency, ReleaseMetadata};

use crate::RegistryResult;

/// Anything that can produce the ordered release list for a module.
///
/// The Forge client implements this for production; tests inject in-memory
/// sources. Generic injection keeps the cache and tree builder decoupled
/// from the network.
pub trait ReleaseSource: Send + Sync {
    fn fetch_releases(
        &self,
        canonical_key: &str,
    ) -> impl Future<Output = RegistryResult<Vec<ReleaseMetadata>>> + Send;
}

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// HTTP client for the Puppet Forge v3 API
#[derive(Debug, Clone)]
pub struct ForgeClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Retry configuration
    retry_config: RetryConfig,
    /// Base Forge API URL
    base_url: String,
}

const DEFAULT_FORGE_URL: &str = "https://forgeapi.puppet.com";

/// Response payload for `/v3/releases?module={slug}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleasesResponse {
    pub pagination: Pagination,
    pub results: Vec<ForgeRelease>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pagination {
    pub next: Option<String>,
}

/// One release entry as returned by the Forge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForgeRelease {
    pub version: String,
    pub created_at: Option<String>,
    pub metadata: ForgeReleaseMetadata,
}

/// The `metadata.json` embedded in a Forge release
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForgeReleaseMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<ForgeDependency>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForgeDependency {
    pub name: String,
    #[serde(default)]
    pub version_requirement: Option<String>,
}

impl ForgeClient {
    /// Create new Forge client with connection pooling
    pub fn new() -> RegistryResult<Self> {
        Self::with_config(DEFAULT_FORGE_URL.to_string(), RetryConfig::default())
    }

    /// Create a client against a non-default Forge URL (tests, mirrors)
    pub fn with_base_url(base_url: impl Into<String>) -> RegistryResult<Self> {
        Self::with_config(base_url.into(), RetryConfig::default())
    }

    fn with_config(base_url: String, retry_config: RetryConfig) -> RegistryResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .user_agent("pupfile/0.1.0")
            .build()
            .map_err(|e| PupfileError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            retry_config,
            base_url,
        })
    }

    /// Execute an operation with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RegistryResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RegistryResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut last_error = None;

        for attempt in 0..=self.retry_config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    last_error = Some(error);

                    if attempt == self.retry_config.max_retries {
                        break;
                    }

                    // A missing module will not appear on retry
                    if matches!(last_error, Some(PupfileError::ModuleNotFound { .. })) {
                        break;
                    }

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.retry_config.multiplier) as u64,
                        ),
                        self.retry_config.max_delay,
                    );
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PupfileError::Network {
            message: "Retry operation failed without error".to_string(),
            source: None,
        }))
    }

    /// Fetch all releases for a module, following pagination.
    ///
    /// Releases come back newest-first from the Forge and the order is
    /// preserved.
    pub async fn fetch_releases(&self, canonical_key: &str) -> RegistryResult<Vec<ReleaseMetadata>> {
        self.with_retry(|| async {
            let mut releases = Vec::new();
            let mut next_path = Some(format!(
                "/v3/releases?module={}&sort_by=release_date&exclude_fields=readme,changelog,license,tags",
                canonical_key
            ));

            while let Some(path) = next_path.take() {
                let url = format!("{}{}", self.base_url, path);
                let response = self.client.get(&url).send().await.map_err(|e| {
                    PupfileError::Network {
                        message: format!("Failed to fetch releases: {}", e),
                        source: Some(Box::new(e)),
                    }
                })?;

                let page = match response.status() {
                    reqwest::StatusCode::OK => response
                        .json::<ReleasesResponse>()
                        .await
                        .map_err(|e| PupfileError::Network {
                            message: format!("Failed to parse releases: {}", e),
                            source: Some(Box::new(e)),
                        })?,
                    reqwest::StatusCode::NOT_FOUND => {
                        return Err(PupfileError::ModuleNotFound {
                            name: canonical_key.to_string(),
                        })
                    }
                    status => {
                        return Err(PupfileError::Network {
                            message: format!(
                                "Forge returned status {} for {}",
                                status, canonical_key
                            ),
                            source: None,
                        })
                    }
                };

                releases.extend(page.results.iter().map(ForgeRelease::to_release_metadata));
                next_path = page.pagination.next;
            }

            if releases.is_empty() {
                return Err(PupfileError::ModuleNotFound {
                    name: canonical_key.to_string(),
                });
            }

            tracing::debug!(
                module = canonical_key,
                releases = releases.len(),
                "fetched release list from Forge"
            );
            Ok(releases)
        })
        .await
    }
}

impl ReleaseSource for ForgeClient {
    async fn fetch_releases(&self, canonical_key: &str) -> RegistryResult<Vec<ReleaseMetadata>> {
        ForgeClient::fetch_releases(self, canonical_key).await
    }
}

impl ForgeRelease {
    /// Convert the Forge wire format into the cached release unit
    fn to_release_metadata(&self) -> ReleaseMetadata {
        ReleaseMetadata {
            version: self.version.clone(),
            created_at: self.created_at.as_deref().and_then(parse_forge_timestamp),
            dependencies: self
                .metadata
                .dependencies
                .iter()
                .map(|dep| ModuleDependency {
                    name: dep.name.clone(),
                    version_requirement: dep
                        .version_requirement
                        .clone()
                        .unwrap_or_else(|| ">= 0.0.0".to_string()),
                })
                .collect(),
        }
    }
}

/// The Forge emits `2019-01-01 12:00:00 -0800`; some mirrors emit RFC 3339.
/// Anything else is dropped rather than failing the release.
fn parse_forge_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
