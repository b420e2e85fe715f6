//! Host-facing capability surface.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::breaker::RateLimitBreaker;
use crate::cache::ResponseCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{ComponentConfig, UpdaterConfig};
use crate::error::UpdateResult;
use crate::github::GitHubClient;
use crate::local::LocalInstall;
use crate::notice::{ErrorBook, ErrorNotice, Notifier, TracingNotifier};
use crate::reconciler::Reconciler;
use crate::record::{ServeFrom, UpdateRecord};
use crate::registry::Registry;
use crate::staging::{DirectoryMover, FsMover, Stager};
use crate::store::{KeyValueStore, MemoryStore};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Label shown next to components served from the hosting provider
pub const SOURCE_LABEL: &str = "GitHub";

/// Section shown when no readme could be loaded
const README_UNAVAILABLE: &str =
    r#"<div class="notice notice-error"><p>Not able to load Readme file</p></div>"#;

/// Update offer for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOffer {
    pub slug: String,
    /// Remote version, or the installed one on a `no_update` entry
    pub new_version: String,
    pub download_url: Option<String>,
    pub release_notes_url: Option<String>,
    /// Release notes, when the component opted into upgrade notices
    pub changelog: Option<String>,
    pub requires_platform: Option<String>,
    pub requires_runtime: Option<String>,
    pub tested_up_to: Option<String>,
    pub icons: BTreeMap<String, String>,
    pub banners: BTreeMap<String, String>,
}

impl UpdateOffer {
    fn from_record(record: &UpdateRecord) -> Self {
        let new_version = if record.update_available() {
            record.remote_version.clone()
        } else {
            record
                .local_version
                .clone()
                .or_else(|| record.remote_version.clone())
        };

        Self {
            slug: record.slug.clone(),
            new_version: new_version.unwrap_or_default(),
            download_url: record.package_url.clone(),
            release_notes_url: record.release_url.clone(),
            changelog: record
                .changelog
                .clone()
                .filter(|_| record.config.show_upgrade_notice),
            requires_platform: record.requires_platform.clone(),
            requires_runtime: record.requires_runtime.clone(),
            tested_up_to: record.tested_up_to.clone(),
            icons: record.icons.clone(),
            banners: record.banners.clone(),
        }
    }

    /// Entry for a component with no usable record.
    fn unavailable(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            new_version: String::new(),
            download_url: None,
            release_notes_url: None,
            changelog: None,
            requires_platform: None,
            requires_runtime: None,
            tested_up_to: None,
            icons: BTreeMap::new(),
            banners: BTreeMap::new(),
        }
    }
}

/// Result of a scheduled update check. Every queried slug lands in exactly
/// one of the two maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheck {
    pub response: IndexMap<String, UpdateOffer>,
    pub no_update: IndexMap<String, UpdateOffer>,
}

/// Person or project credited on the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub display_name: String,
    pub profile_url: String,
    pub avatar_url: Option<String>,
}

/// Detail-view information for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub slug: String,
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub author_profile_url: Option<String>,
    pub homepage_url: Option<String>,
    pub short_description: Option<String>,
    pub download_url: Option<String>,
    pub release_notes_url: Option<String>,
    pub requires_platform: Option<String>,
    pub requires_runtime: Option<String>,
    pub tested_up_to: Option<String>,
    pub icons: BTreeMap<String, String>,
    pub banners: BTreeMap<String, String>,
    pub sections: IndexMap<String, String>,
    pub contributors: Vec<Contributor>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub added_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PluginInfo {
    fn from_record(record: &UpdateRecord) -> Self {
        let mut contributors = Vec::new();
        if let Some(repo) = &record.repo {
            contributors.push(Contributor {
                display_name: repo.name.clone(),
                profile_url: repo.owner_url.clone(),
                avatar_url: record.icons.get("default").cloned(),
            });
            contributors.push(Contributor {
                display_name: repo.owner_login.clone(),
                profile_url: repo.owner_url.clone(),
                avatar_url: Some(repo.owner_avatar.clone()).filter(|url| !url.is_empty()),
            });
        }

        let mut sections = record.readme_sections.clone();
        if sections.is_empty() {
            sections.insert("description".to_string(), README_UNAVAILABLE.to_string());
        }

        Self {
            slug: record.slug.clone(),
            name: record
                .name
                .clone()
                .or_else(|| record.repo.as_ref().map(|repo| repo.name.clone()))
                .unwrap_or_else(|| record.config.directory().to_string()),
            version: record
                .remote_version
                .clone()
                .or_else(|| record.local_version.clone()),
            author: record.author.clone(),
            author_profile_url: record
                .author_profile
                .clone()
                .or_else(|| record.repo.as_ref().map(|repo| repo.owner_url.clone())),
            homepage_url: record
                .homepage
                .clone()
                .or_else(|| record.repo.as_ref().map(|repo| repo.html_url.clone())),
            short_description: record.repo.as_ref().and_then(|repo| repo.description.clone()),
            download_url: record.package_url.clone(),
            release_notes_url: record.release_url.clone(),
            requires_platform: record.requires_platform.clone(),
            requires_runtime: record.requires_runtime.clone(),
            tested_up_to: record.tested_up_to.clone(),
            icons: record.icons.clone(),
            banners: record.banners.clone(),
            sections,
            contributors,
            last_updated_at: record.updated_at,
            added_at: record.added_at,
            last_error: record.last_error.clone(),
        }
    }
}

/// Builder wiring the collaborators into an [`Updater`].
pub struct UpdaterBuilder {
    config: UpdaterConfig,
    local: Arc<dyn LocalInstall>,
    transport: Option<Arc<dyn HttpTransport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    mover: Option<Arc<dyn DirectoryMover>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl UpdaterBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn mover(mut self, mover: Arc<dyn DirectoryMover>) -> Self {
        self.mover = Some(mover);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Updater {
        let config = Arc::new(self.config);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let mover = self.mover.unwrap_or_else(|| Arc::new(FsMover));

        let registry = Arc::new(Registry::new());
        let errors = Arc::new(ErrorBook::new(store.clone(), config.error_retention()));
        let client = GitHubClient::new(
            transport,
            Arc::new(ResponseCache::new()),
            Arc::new(RateLimitBreaker::new(store.clone())),
            errors.clone(),
            clock.clone(),
            config.clone(),
        );
        let reconciler = Reconciler::new(
            registry.clone(),
            client,
            store.clone(),
            self.local,
            notifier,
            clock.clone(),
            config,
        );
        let stager = Stager::new(registry.clone(), store, mover);

        Updater {
            registry,
            reconciler,
            stager,
            errors,
            clock,
        }
    }
}

/// Composition root handle the host drives.
pub struct Updater {
    registry: Arc<Registry>,
    reconciler: Reconciler,
    stager: Stager,
    errors: Arc<ErrorBook>,
    clock: Arc<dyn Clock>,
}

impl Updater {
    /// Start wiring an updater. Unset collaborators default to the reqwest
    /// transport, an in-memory store, the filesystem mover, the tracing
    /// notifier and the system clock.
    pub fn builder(config: UpdaterConfig, local: Arc<dyn LocalInstall>) -> UpdaterBuilder {
        UpdaterBuilder {
            config,
            local,
            transport: None,
            store: None,
            mover: None,
            notifier: None,
            clock: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Register a component.
    pub fn register(&self, config: ComponentConfig) -> UpdateResult<()> {
        self.registry.register(config)
    }

    /// Scheduled check: reconcile everything and sort each component into
    /// `response` (update available) or `no_update`.
    pub async fn on_check_for_updates(&self) -> UpdateCheck {
        let mut check = UpdateCheck::default();
        for (slug, result) in self.reconciler.reconcile_all().await {
            match result {
                Ok(record) if record.update_available() => {
                    check.response.insert(slug, UpdateOffer::from_record(&record));
                }
                Ok(record) => {
                    check.no_update.insert(slug, UpdateOffer::from_record(&record));
                }
                Err(_) => {
                    check.no_update.insert(slug.clone(), UpdateOffer::unavailable(&slug));
                }
            }
        }
        tracing::debug!(
            updates = check.response.len(),
            current = check.no_update.len(),
            "Update check finished"
        );
        check
    }

    /// Detail view for `slug`.
    pub async fn on_plugin_info_requested(&self, slug: &str) -> UpdateResult<PluginInfo> {
        let record = self.reconciler.reconcile(slug).await?;
        Ok(PluginInfo::from_record(&record))
    }

    /// A new copy of `slug` was installed; pick up its version.
    pub fn on_post_install(&self, slug: &str) -> UpdateResult<UpdateRecord> {
        self.reconciler.refresh_local(slug)
    }

    /// Path the installer should continue with after extracting an archive.
    pub fn on_source_selection(&self, extracted: &Path, expected_slug: &str) -> PathBuf {
        self.stager.relocate(extracted, expected_slug).into_path()
    }

    /// First check after activation.
    pub async fn on_activate(&self, slug: &str) -> UpdateResult<UpdateRecord> {
        self.reconciler.reconcile(slug).await
    }

    /// Remove everything kept for `slug`.
    pub fn on_uninstall(&self, slug: &str) -> UpdateResult<()> {
        self.reconciler.forget(slug)?;
        self.errors.clear(slug);
        Ok(())
    }

    /// Pin `slug` to local or remote resolution.
    pub fn set_serve_from(&self, slug: &str, mode: ServeFrom) -> UpdateResult<UpdateRecord> {
        self.reconciler.set_serve_from(slug, mode)
    }

    /// Recorded error for row-level display.
    pub fn error_notice(&self, slug: &str) -> Option<ErrorNotice> {
        let message = self.errors.get(slug, self.clock.now())?;
        Some(ErrorNotice {
            slug: slug.to_string(),
            message,
            is_user_facing: true,
        })
    }

    /// Source label for components updated from the hosting provider.
    pub fn source_label(&self, slug: &str) -> Option<&'static str> {
        let remote = match self.reconciler.record(slug) {
            Some(record) => record.serve_from == ServeFrom::Remote,
            None => self.registry.contains(slug),
        };
        remote.then_some(SOURCE_LABEL)
    }
}
