//! GitHub REST API client.
//!
//! Every query goes through one cached request path: cache lookup, then the
//! rate-limit breaker, then the transport. 404 is "no data" (`Ok(None)`),
//! every other failure is a [`FetchError`] recorded against the component.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::breaker::{QuotaHeaders, RateLimitBreaker};
use crate::cache::{CacheEntry, Fingerprint, ResponseCache, TtlClass};
use crate::clock::Clock;
use crate::config::UpdaterConfig;
use crate::error::FetchError;
use crate::locator::RepoLocator;
use crate::notice::ErrorBook;
use crate::transport::{HttpRequest, HttpTransport};

/// Result of one query; `Ok(None)` when the resource does not exist.
pub type Fetched<T> = Result<Option<T>, FetchError>;

/// Content type marking an uploaded release asset as a prebuilt package
pub const PACKAGE_CONTENT_TYPE: &str = "application/octet-stream";

/// GitHub REST API version header value
pub const API_VERSION: &str = "2022-11-28";

/// Repository owner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Repository facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: Owner,
}

/// File attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Latest published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Release notes
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    /// Generated source archive
    #[serde(default)]
    pub zipball_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Package to install.
    ///
    /// An uploaded binary asset is preferred over the generated source
    /// archive, whose top-level folder name is unpredictable. For private
    /// repositories the asset URL needs the same bearer credential as the API.
    pub fn package_url(&self) -> Option<&str> {
        self.assets
            .iter()
            .find(|asset| asset.content_type == PACKAGE_CONTENT_TYPE)
            .map(|asset| asset.browser_download_url.as_str())
            .or(self.zipball_url.as_deref())
    }
}

/// Entry of a directory listing from the contents API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Single file from the contents API.
#[derive(Debug, Clone, Deserialize)]
struct ContentFile {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl ContentFile {
    fn decode(&self) -> Result<String, FetchError> {
        if !self.encoding.is_empty() && self.encoding != "base64" {
            return Err(FetchError::Decode {
                message: format!("unsupported content encoding {}", self.encoding),
            });
        }
        // the API wraps base64 content at 60 columns
        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| FetchError::Decode {
                message: e.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Icons and banners found in the repository's asset directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artwork {
    pub icons: BTreeMap<String, String>,
    pub banners: BTreeMap<String, String>,
}

impl Artwork {
    /// Sort a directory listing into icon and banner slots by file name.
    pub fn scan(entries: &[ContentEntry]) -> Self {
        let mut artwork = Self::default();
        for entry in entries {
            let Some(url) = entry.download_url.clone() else {
                continue;
            };
            let name = entry.name.to_ascii_lowercase();

            if name.contains("icon") {
                artwork.icons.insert("default".to_string(), url.clone());
                if name.contains("128x128") {
                    artwork.icons.insert("1x".to_string(), url.clone());
                } else if name.contains("256x256") {
                    artwork.icons.insert("2x".to_string(), url.clone());
                } else if name.ends_with(".svg") {
                    artwork.icons.insert("svg".to_string(), url.clone());
                }
            }

            if name.contains("banner") {
                if name.contains("772x250") {
                    artwork.banners.insert("low".to_string(), url);
                } else if name.contains("1544x500") {
                    artwork.banners.insert("high".to_string(), url);
                } else {
                    artwork.banners.insert("low".to_string(), url.clone());
                    artwork.banners.insert("high".to_string(), url);
                }
            }
        }
        artwork
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty() && self.banners.is_empty()
    }
}

/// Cached, rate-limit aware client for the hosting API.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<ResponseCache>,
    breaker: Arc<RateLimitBreaker>,
    errors: Arc<ErrorBook>,
    clock: Arc<dyn Clock>,
    config: Arc<UpdaterConfig>,
}

impl GitHubClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ResponseCache>,
        breaker: Arc<RateLimitBreaker>,
        errors: Arc<ErrorBook>,
        clock: Arc<dyn Clock>,
        config: Arc<UpdaterConfig>,
    ) -> Self {
        Self {
            transport,
            cache,
            breaker,
            errors,
            clock,
            config,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    pub fn breaker(&self) -> &RateLimitBreaker {
        &self.breaker
    }

    /// Drop cached responses that have expired, including ones whose
    /// fingerprint will never be requested again.
    pub fn purge_expired(&self) {
        self.cache.purge_expired(self.clock.now());
    }

    /// Whether the breaker currently suppresses requests.
    pub fn is_rate_limited(&self) -> bool {
        self.breaker.is_tripped(self.clock.now())
    }

    /// Get repository facts.
    pub async fn get_repo(&self, locator: &RepoLocator, slug: &str) -> Fetched<Repository> {
        let url = format!("{}/repos/{}", self.base_url(), locator);
        let value = self.request(&url, TtlClass::Repository, slug).await?;
        self.typed(value, slug)
    }

    /// Get the latest published release.
    pub async fn get_latest_release(&self, locator: &RepoLocator, slug: &str) -> Fetched<Release> {
        let url = format!("{}/repos/{}/releases/latest", self.base_url(), locator);
        let value = self.request(&url, TtlClass::Release, slug).await?;
        self.typed(value, slug)
    }

    /// List a repository directory.
    pub async fn get_assets(
        &self,
        locator: &RepoLocator,
        path: &str,
        slug: &str,
    ) -> Fetched<Vec<ContentEntry>> {
        let url = format!(
            "{}/repos/{}/contents/{}/",
            self.base_url(),
            locator,
            path.trim_matches('/')
        );
        let value = self.request(&url, TtlClass::Assets, slug).await?;
        self.typed(value, slug)
    }

    /// Get a readme file as text.
    pub async fn get_readme(&self, locator: &RepoLocator, file: &str, slug: &str) -> Fetched<String> {
        let url = format!(
            "{}/repos/{}/contents/{}",
            self.base_url(),
            locator,
            file.trim_start_matches('/')
        );
        let value = self.request(&url, TtlClass::Assets, slug).await?;
        let Some(file) = self.typed::<ContentFile>(value, slug)? else {
            return Ok(None);
        };
        file.decode().map(Some).inspect_err(|e| {
            self.errors.record(slug, &e.to_string(), self.clock.now());
        })
    }

    fn typed<T: DeserializeOwned>(&self, value: Option<Value>, slug: &str) -> Fetched<T> {
        let Some(value) = value else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|e| {
            let err = FetchError::Decode {
                message: e.to_string(),
            };
            self.errors.record(slug, &err.to_string(), self.clock.now());
            err
        })
    }

    fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::from([
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
            (
                "User-Agent".to_string(),
                uplift_common::USER_AGENT.to_string(),
            ),
        ]);
        if let Some(token) = &self.config.token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers
    }

    fn success_expiry(&self, class: TtlClass, now: DateTime<Utc>) -> DateTime<Utc> {
        let jitter = match self.config.ttl_jitter_secs {
            0 => 0,
            max => rand::rng().random_range(0..=max),
        };
        now + Duration::seconds((class.ttl_secs(&self.config) + jitter) as i64)
    }

    fn failure_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.config.failure_ttl_secs as i64)
    }

    async fn request(&self, url: &str, class: TtlClass, slug: &str) -> Fetched<Value> {
        let now = self.clock.now();
        let headers = self.headers();
        let key = Fingerprint::of(url, &headers);

        if let Some(entry) = self.cache.get(&key, now) {
            tracing::debug!(slug, %key, "Cache hit for {}", url);
            return entry.payload;
        }

        if let Some(reset_at) = self.breaker.tripped_until(now) {
            tracing::debug!(slug, "Rate limited, skipping {}", url);
            let err = FetchError::RateLimited { reset_at };
            self.errors.record(slug, &err.to_string(), now);
            return Err(err);
        }

        tracing::debug!(slug, %key, "Fetching {}", url);
        let request = HttpRequest {
            url: url.to_string(),
            headers,
            timeout: self.config.request_timeout(),
        };

        let response = match self.transport.get(request).await {
            Ok(response) => response,
            Err(e) => {
                let err = FetchError::Transport { message: e.message };
                return self.fail(key, slug, err, now);
            }
        };

        let quota = QuotaHeaders::parse(&response.headers);
        if quota.exhausted()
            && let Some(reset_at) = quota.reset_at
            && let Err(e) = self.breaker.trip(reset_at)
        {
            tracing::warn!("Failed to persist rate limit: {}", e);
        }

        if response.status == 404 {
            tracing::debug!(slug, "No data at {}", url);
            self.cache.insert(
                key,
                CacheEntry {
                    payload: Ok(None),
                    expires_at: self.failure_expiry(now),
                },
            );
            return Ok(None);
        }

        if !response.is_success() {
            let err = match quota.reset_at {
                Some(reset_at) if quota.exhausted() => FetchError::RateLimited { reset_at },
                _ => FetchError::HostingApi {
                    status: response.status,
                    message: api_message(&response.body),
                },
            };
            return self.fail(key, slug, err, now);
        }

        let value = match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => value,
            Err(e) => {
                let err = FetchError::Decode {
                    message: e.to_string(),
                };
                return self.fail(key, slug, err, now);
            }
        };

        self.cache.insert(
            key,
            CacheEntry {
                payload: Ok(Some(value.clone())),
                expires_at: self.success_expiry(class, now),
            },
        );
        self.errors.clear(slug);
        Ok(Some(value))
    }

    fn fail(&self, key: Fingerprint, slug: &str, err: FetchError, now: DateTime<Utc>) -> Fetched<Value> {
        tracing::warn!(slug, "Hosting API request failed: {}", err);
        self.errors.record(slug, &err.to_string(), now);
        self.cache.insert(
            key,
            CacheEntry {
                payload: Err(err.clone()),
                expires_at: self.failure_expiry(now),
            },
        );
        Err(err)
    }
}

/// Provider message from an error body, falling back to the raw body.
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
