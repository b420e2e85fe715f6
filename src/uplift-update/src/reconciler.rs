//! Update record reconciler - merges remote, local and readme facts into one
//! persisted record per component.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::{ComponentConfig, UpdaterConfig};
use crate::error::{FetchError, UpdateError, UpdateResult};
use crate::github::{Artwork, GitHubClient, Release, Repository};
use crate::local::{InstalledMetadata, LocalInstall, MARKDOWN_README};
use crate::locator::RepoLocator;
use crate::notice::{ErrorNotice, Notifier};
use crate::record::{
    RecordState, RepoFacts, ServeFrom, UpdateRecord, load_record, load_records, remove_record,
    save_record,
};
use crate::registry::Registry;
use crate::store::KeyValueStore;
use crate::version::{is_newer, is_valid_version};

/// Owner and only writer of update records.
pub struct Reconciler {
    registry: Arc<Registry>,
    client: GitHubClient,
    store: Arc<dyn KeyValueStore>,
    local: Arc<dyn LocalInstall>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Arc<UpdaterConfig>,
    write_lock: Mutex<()>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a slug as refreshing until dropped.
struct InFlight<'a> {
    slugs: &'a Mutex<HashSet<String>>,
    slug: String,
}

impl<'a> InFlight<'a> {
    fn enter(slugs: &'a Mutex<HashSet<String>>, slug: &str) -> Option<Self> {
        if !slugs.lock().insert(slug.to_string()) {
            return None;
        }
        Some(Self {
            slugs,
            slug: slug.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slugs.lock().remove(&self.slug);
    }
}

impl Reconciler {
    pub fn new(
        registry: Arc<Registry>,
        client: GitHubClient,
        store: Arc<dyn KeyValueStore>,
        local: Arc<dyn LocalInstall>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: Arc<UpdaterConfig>,
    ) -> Self {
        Self {
            registry,
            client,
            store,
            local,
            notifier,
            clock,
            config,
            write_lock: Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn staleness(&self) -> Duration {
        Duration::seconds(self.config.staleness_secs as i64)
    }

    /// Registration for `slug`, falling back to the one persisted with its
    /// record when the component is not registered in this process.
    fn component(&self, slug: &str) -> UpdateResult<ComponentConfig> {
        self.registry
            .get(slug)
            .or_else(|| self.record(slug).map(|record| record.config))
            .ok_or_else(|| UpdateError::NotConfigured {
                slug: slug.to_string(),
            })
    }

    /// Record with local facts only, for components never reconciled.
    fn base_record(&self, config: &ComponentConfig, locator: &RepoLocator) -> UpdateRecord {
        let mut record = UpdateRecord::new(config, locator.to_string());
        if let Some(meta) = self.local.metadata(&config.slug) {
            record.apply_local(&meta);
        }
        record
    }

    /// Persisted record for `slug`, without any refresh.
    pub fn record(&self, slug: &str) -> Option<UpdateRecord> {
        load_record(self.store.as_ref(), slug)
    }

    /// Every persisted record.
    pub fn records(&self) -> BTreeMap<String, UpdateRecord> {
        load_records(self.store.as_ref())
    }

    pub fn state(&self, slug: &str) -> RecordState {
        if self.in_flight.lock().contains(slug) {
            return RecordState::Refreshing;
        }
        match self.record(slug) {
            Some(record) => record.state(self.clock.now(), self.staleness()),
            None => RecordState::Unseen,
        }
    }

    /// Answer from the persisted record, without network activity.
    pub fn update_available(&self, slug: &str) -> UpdateResult<bool> {
        match self.record(slug) {
            Some(record) => Ok(record.update_available()),
            None if self.registry.contains(slug) => Ok(false),
            None => Err(UpdateError::NotConfigured {
                slug: slug.to_string(),
            }),
        }
    }

    /// Bring the record for `slug` up to date.
    ///
    /// Records younger than the staleness threshold are returned as they are.
    /// Fetch failures do not surface as errors: they land in the record's
    /// `last_error` while every other field keeps its last good value.
    pub async fn reconcile(&self, slug: &str) -> UpdateResult<UpdateRecord> {
        let config = self.component(slug)?;
        let locator = config.locator()?;
        let now = self.clock.now();
        let previous = self.record(slug);

        if let Some(record) = &previous {
            if record.age(now).is_some_and(|age| age < self.staleness()) {
                tracing::debug!(slug, "Record fresh, skipping refresh");
                return Ok(record.clone());
            }
            if record.serve_from == ServeFrom::Local {
                tracing::debug!(slug, "Served locally, skipping remote check");
                return self.refresh_local(slug);
            }
        }

        let Some(_guard) = InFlight::enter(&self.in_flight, slug) else {
            tracing::debug!(slug, "Refresh already in flight");
            return Ok(previous.unwrap_or_else(|| self.base_record(&config, &locator)));
        };

        tracing::info!(slug, repository = %locator, "Refreshing update record");
        match self.refresh(&config, &locator, previous.clone(), now).await {
            Ok(refreshed) => {
                let record = self.write(slug, |current| {
                    merge_refresh(current, previous.as_ref(), refreshed)
                })?;
                tracing::info!(
                    slug,
                    local = record.local_version.as_deref().unwrap_or("-"),
                    remote = record.remote_version.as_deref().unwrap_or("-"),
                    "Update record refreshed"
                );
                Ok(record)
            }
            Err(err) => self.fail(&config, &locator, err),
        }
    }

    /// Reconcile every registered or previously recorded component.
    ///
    /// One component's failure does not stop the others.
    pub async fn reconcile_all(&self) -> Vec<(String, UpdateResult<UpdateRecord>)> {
        self.client.purge_expired();

        let mut slugs = self.registry.slugs();
        for slug in self.records().into_keys() {
            if !slugs.contains(&slug) {
                slugs.push(slug);
            }
        }

        let mut results = Vec::with_capacity(slugs.len());
        for slug in slugs {
            let result = self.reconcile(&slug).await;
            if let Err(e) = &result {
                tracing::warn!(slug = %slug, "Reconciliation failed: {}", e);
            }
            results.push((slug, result));
        }
        results
    }

    /// Pin resolution for `slug` to the hosting provider or to the installed
    /// copy. Cached metadata is kept either way.
    pub fn set_serve_from(&self, slug: &str, mode: ServeFrom) -> UpdateResult<UpdateRecord> {
        let config = self.component(slug)?;
        let locator = config.locator()?;
        let record = self.write(slug, |current| {
            let mut record = current.unwrap_or_else(|| self.base_record(&config, &locator));
            record.serve_from = mode;
            record
        })?;
        tracing::info!(slug, ?mode, "Update source changed");
        Ok(record)
    }

    /// Re-read installed facts for `slug` without any network activity.
    pub fn refresh_local(&self, slug: &str) -> UpdateResult<UpdateRecord> {
        let config = self.component(slug)?;
        let locator = config.locator()?;
        let installed = self.local.metadata(slug);
        self.write(slug, |current| {
            let mut record = current.unwrap_or_else(|| self.base_record(&config, &locator));
            match &installed {
                Some(meta) => record.apply_local(meta),
                None => tracing::debug!(slug, "Component not installed, local facts unchanged"),
            }
            record
        })
    }

    /// Destroy the record for `slug`. Returns whether one existed.
    pub fn forget(&self, slug: &str) -> UpdateResult<bool> {
        let _guard = self.write_lock.lock();
        let removed = remove_record(self.store.as_ref(), slug)?;
        if removed {
            tracing::info!(slug, "Update record removed");
        }
        Ok(removed)
    }

    /// Read-modify-write of the stored record for `slug` under the write
    /// lock, so writes made while a refresh was awaiting the network survive.
    fn write<F>(&self, slug: &str, update: F) -> UpdateResult<UpdateRecord>
    where
        F: FnOnce(Option<UpdateRecord>) -> UpdateRecord,
    {
        let _guard = self.write_lock.lock();
        let record = update(load_record(self.store.as_ref(), slug));
        save_record(self.store.as_ref(), &record)?;
        Ok(record)
    }

    fn fail(
        &self,
        config: &ComponentConfig,
        locator: &RepoLocator,
        err: FetchError,
    ) -> UpdateResult<UpdateRecord> {
        let message = err.to_string();
        tracing::warn!(slug = %config.slug, "Refresh failed, keeping last known data: {}", message);

        let record = self.write(&config.slug, |current| {
            let mut record = current.unwrap_or_else(|| self.base_record(config, locator));
            record.last_error = Some(message.clone());
            record
        })?;

        self.notifier.notify(&ErrorNotice {
            slug: config.slug.clone(),
            message,
            is_user_facing: true,
        });
        Ok(record)
    }

    /// One refresh round. Nothing is persisted here, so abandoning the future
    /// between fetches leaves the stored record untouched.
    async fn refresh(
        &self,
        config: &ComponentConfig,
        locator: &RepoLocator,
        previous: Option<UpdateRecord>,
        now: DateTime<Utc>,
    ) -> Result<UpdateRecord, FetchError> {
        let slug = config.slug.as_str();
        let mut record = previous.unwrap_or_else(|| UpdateRecord::new(config, locator.to_string()));
        record.config = config.clone();
        record.repository = locator.to_string();

        let installed = self.local.metadata(slug);
        if let Some(meta) = &installed {
            record.apply_local(meta);
        }

        let repo = self.client.get_repo(locator, slug).await?;
        apply_repo(&mut record, repo);

        if self.client.is_rate_limited() {
            tracing::debug!(slug, "Rate limited, keeping previous release");
        } else {
            let release = self.client.get_latest_release(locator, slug).await?;
            apply_release(&mut record, release);
        }

        if self.client.is_rate_limited() {
            tracing::debug!(slug, "Rate limited, keeping previous artwork");
        } else {
            let listing = self
                .client
                .get_assets(locator, &self.config.assets_dir, slug)
                .await?;
            let artwork = listing.map(|entries| Artwork::scan(&entries)).unwrap_or_default();
            record.icons = artwork.icons;
            record.banners = artwork.banners;
        }

        let remote_readme =
            wants_remote_readme(record.local_version.as_deref(), record.remote_version.as_deref());
        if remote_readme && self.client.is_rate_limited() {
            tracing::debug!(slug, "Rate limited, keeping previous readme");
        } else {
            let text = self.readme_text(config, locator, remote_readme).await?;
            let document = text.as_deref().map(uplift_readme::parse);
            apply_readme(&mut record, document, installed.as_ref());
        }

        record.last_error = None;
        record.last_updated_at = Some(now);
        Ok(record)
    }

    /// Readme to parse: the remote one describes the upcoming release, the
    /// installed one the applied release.
    async fn readme_text(
        &self,
        config: &ComponentConfig,
        locator: &RepoLocator,
        remote: bool,
    ) -> Result<Option<String>, FetchError> {
        let slug = config.slug.as_str();
        let local = self.local.readme(slug);
        if !remote {
            return Ok(local.map(|readme| readme.text));
        }

        let file = match &local {
            Some(readme) if readme.is_markdown() => MARKDOWN_README,
            _ => config.readme_file.as_str(),
        };
        match self.client.get_readme(locator, file, slug).await? {
            Some(text) => Ok(Some(text)),
            None => {
                tracing::debug!(slug, file, "No remote readme, using installed copy");
                Ok(local.map(|readme| readme.text))
            }
        }
    }
}

/// Fold a finished refresh into the record stored now. The refresh owns the
/// remote, readme and repository facts; the pin always stays as stored, and
/// local facts stay too when they were rewritten while the refresh ran.
fn merge_refresh(
    current: Option<UpdateRecord>,
    snapshot: Option<&UpdateRecord>,
    refreshed: UpdateRecord,
) -> UpdateRecord {
    let Some(current) = current else {
        return refreshed;
    };
    let mut merged = refreshed;
    merged.serve_from = current.serve_from;

    let rewritten = snapshot.is_none_or(|snapshot| !snapshot.same_local_facts(&current));
    if rewritten {
        merged.name = current.name;
        merged.author = current.author;
        merged.author_profile = current.author_profile;
        merged.homepage = current.homepage;
        merged.local_version = current.local_version;
    }
    merged
}

/// Remote readme is wanted when no release is known yet or the release is
/// newer than the installed copy.
fn wants_remote_readme(local: Option<&str>, remote: Option<&str>) -> bool {
    match (local, remote) {
        (_, None) | (None, Some(_)) => true,
        (Some(local), Some(remote)) => is_newer(local, remote),
    }
}

fn apply_repo(record: &mut UpdateRecord, repo: Option<Repository>) {
    let Some(repo) = repo else {
        record.repo = None;
        return;
    };
    record.added_at = repo.created_at;
    record.updated_at = repo.updated_at;
    record.repo = Some(RepoFacts {
        name: repo.name,
        description: repo.description,
        html_url: repo.html_url,
        owner_login: repo.owner.login,
        owner_url: repo.owner.html_url,
        owner_avatar: repo.owner.avatar_url,
    });
}

fn apply_release(record: &mut UpdateRecord, release: Option<Release>) {
    let Some(release) = release else {
        tracing::debug!(slug = %record.slug, "No published release");
        record.remote_version = None;
        record.package_url = None;
        record.changelog = None;
        record.release_url = None;
        return;
    };

    record.remote_version = if is_valid_version(&release.tag_name) {
        Some(release.tag_name.clone())
    } else {
        tracing::warn!(slug = %record.slug, tag = %release.tag_name, "Release tag is not a version");
        None
    };
    record.package_url = release.package_url().map(str::to_string);
    record.changelog = release.body.filter(|body| !body.trim().is_empty());
    record.release_url = Some(release.html_url).filter(|url| !url.is_empty());
}

/// Readme fields win over entry-file headers; without a readme the headers
/// are all there is.
fn apply_readme(
    record: &mut UpdateRecord,
    document: Option<uplift_readme::ReadmeDocument>,
    installed: Option<&InstalledMetadata>,
) {
    let document = document.unwrap_or_default();

    record.requires_platform = document
        .requires_platform
        .or_else(|| installed.and_then(|meta| meta.requires_platform.clone()));
    record.requires_runtime = document
        .requires_runtime
        .or_else(|| installed.and_then(|meta| meta.requires_runtime.clone()));
    record.tested_up_to = document.tested_up_to;
    record.readme_sections = document.sections;
}
