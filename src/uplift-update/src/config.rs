//! Updater and component configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{UpdateError, UpdateResult};
use crate::locator::RepoLocator;

/// Readme file probed when a component does not name one
pub const DEFAULT_README_FILE: &str = "readme.txt";

/// Repository directory listing icons and banners
pub const DEFAULT_ASSETS_DIR: &str = ".wordpress-org";

/// Default hosting API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Environment variables consulted for the bearer credential, in order
pub const TOKEN_ENV_VARS: [&str; 2] = ["UPLIFT_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Registration of one component against a hosting-provider repository.
///
/// Immutable once handed to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Unique key, `"plugin-dir/plugin-file.php"`
    pub slug: String,
    /// `owner/name`, or a bare name when `username` carries the owner
    pub repository: String,
    /// Legacy owner field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Readme file probed remotely when the install ships no `README.md`
    #[serde(default = "default_readme_file")]
    pub readme_file: String,
    /// Whether release notes ride along with the update offer
    #[serde(default = "default_true")]
    pub show_upgrade_notice: bool,
}

fn default_readme_file() -> String {
    DEFAULT_README_FILE.to_string()
}

fn default_true() -> bool {
    true
}

impl ComponentConfig {
    /// Create a config with defaults for everything but identity.
    pub fn new(slug: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            repository: repository.into(),
            username: None,
            readme_file: default_readme_file(),
            show_upgrade_notice: true,
        }
    }

    /// Set the legacy owner field.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the readme file name.
    pub fn with_readme_file(mut self, readme_file: impl Into<String>) -> Self {
        self.readme_file = readme_file.into();
        self
    }

    /// Toggle release notes on the update offer.
    pub fn with_upgrade_notice(mut self, show: bool) -> Self {
        self.show_upgrade_notice = show;
        self
    }

    /// Resolve the repository locator, honoring the legacy owner field.
    pub fn locator(&self) -> UpdateResult<RepoLocator> {
        match (&self.username, self.repository.contains('/')) {
            (Some(owner), false) => RepoLocator::new(owner, &self.repository),
            _ => self.repository.parse(),
        }
    }

    /// Directory component of the slug (`"widget"` for `"widget/widget.php"`).
    pub fn directory(&self) -> &str {
        slug_directory(&self.slug)
    }
}

/// Directory component of a slug; a slug without `/` is its own directory.
pub fn slug_directory(slug: &str) -> &str {
    slug.split_once('/').map_or(slug, |(dir, _)| dir)
}

/// Updater-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Hosting API base URL (for enterprise hosts and tests)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Optional bearer credential attached to outbound requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Seconds before a record must be re-verified
    #[serde(default = "default_staleness")]
    pub staleness_secs: u64,

    /// Cache TTL for repository lookups
    #[serde(default = "default_repo_ttl")]
    pub repo_ttl_secs: u64,

    /// Cache TTL for latest-release lookups
    #[serde(default = "default_release_ttl")]
    pub release_ttl_secs: u64,

    /// Cache TTL for asset listings and readmes
    #[serde(default = "default_asset_ttl")]
    pub asset_ttl_secs: u64,

    /// Cache TTL for failed requests
    #[serde(default = "default_failure_ttl")]
    pub failure_ttl_secs: u64,

    /// Upper bound of random seconds added to successful cache entries
    #[serde(default = "default_jitter")]
    pub ttl_jitter_secs: u64,

    /// Timeout for one outbound request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Repository directory scanned for icons and banners
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Seconds a recorded component error stays displayable
    #[serde(default = "default_error_retention")]
    pub error_retention_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_staleness() -> u64 {
    60
}

fn default_repo_ttl() -> u64 {
    3 * 60
}

fn default_release_ttl() -> u64 {
    3 * 60
}

fn default_asset_ttl() -> u64 {
    3 * 60 * 60
}

fn default_failure_ttl() -> u64 {
    15
}

fn default_jitter() -> u64 {
    360
}

fn default_request_timeout() -> u64 {
    30
}

fn default_assets_dir() -> String {
    DEFAULT_ASSETS_DIR.to_string()
}

fn default_error_retention() -> u64 {
    24 * 60 * 60
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token: None,
            staleness_secs: default_staleness(),
            repo_ttl_secs: default_repo_ttl(),
            release_ttl_secs: default_release_ttl(),
            asset_ttl_secs: default_asset_ttl(),
            failure_ttl_secs: default_failure_ttl(),
            ttl_jitter_secs: default_jitter(),
            request_timeout_secs: default_request_timeout(),
            assets_dir: default_assets_dir(),
            error_retention_secs: default_error_retention(),
        }
    }
}

impl UpdaterConfig {
    /// Load config from the standard location (`~/.uplift/updater.json`),
    /// then fill the token from the environment when the file has none.
    pub fn load() -> Self {
        let config = uplift_common::get_app_dirs()
            .map(|dirs| dirs.config_file())
            .filter(|path| path.exists())
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default();

        config.with_env_token()
    }

    /// Load config from a specific file.
    pub fn load_from(path: &Path) -> UpdateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> UpdateResult<()> {
        let dirs = uplift_common::get_app_dirs().ok_or_else(|| UpdateError::Store {
            message: "No home directory".to_string(),
        })?;
        dirs.ensure_dirs()?;

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(dirs.config_file(), content)?;
        Ok(())
    }

    /// Fill `token` from the first non-empty token environment variable.
    pub fn with_env_token(mut self) -> Self {
        if self.token.is_none() {
            self.token = TOKEN_ENV_VARS.iter().find_map(|var| {
                std::env::var(var)
                    .ok()
                    .filter(|token| !token.trim().is_empty())
            });
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn error_retention(&self) -> Duration {
        Duration::from_secs(self.error_retention_secs)
    }
}
