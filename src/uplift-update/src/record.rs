//! Persisted per-component update record.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ComponentConfig;
use crate::error::UpdateResult;
use crate::local::InstalledMetadata;
use crate::store::KeyValueStore;
use crate::version::is_newer;

/// Store key holding every record as one map
pub const RECORDS_KEY: &str = "uplift_records";

/// Where update resolution is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServeFrom {
    /// Check the hosting provider
    #[default]
    Remote,
    /// Never check remotely
    Local,
}

/// Reconciliation state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// No record yet
    Unseen,
    /// Younger than the staleness threshold
    Fresh,
    /// Due for a refresh on the next query
    Stale,
    /// Fetches in flight
    Refreshing,
    /// Last refresh failed; previous data retained
    Error,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unseen => "unseen",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Refreshing => "refreshing",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Repository facts kept for the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepoFacts {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub owner_login: String,
    pub owner_url: String,
    pub owner_avatar: String,
}

/// Everything known about one component.
///
/// `last_error` never blanks the other fields: a failed refresh only sets
/// the error and leaves the last good data in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub slug: String,
    /// Canonical `owner/name`
    pub repository: String,
    /// Registration the record was built from
    pub config: ComponentConfig,
    /// Last successful reconciliation
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub serve_from: ServeFrom,

    // local facts
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_profile: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub local_version: Option<String>,

    // release
    #[serde(default)]
    pub remote_version: Option<String>,
    #[serde(default)]
    pub package_url: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub release_url: Option<String>,

    // assets
    #[serde(default)]
    pub icons: BTreeMap<String, String>,
    #[serde(default)]
    pub banners: BTreeMap<String, String>,

    // readme
    #[serde(default)]
    pub requires_platform: Option<String>,
    #[serde(default)]
    pub requires_runtime: Option<String>,
    #[serde(default)]
    pub tested_up_to: Option<String>,
    #[serde(default)]
    pub readme_sections: IndexMap<String, String>,

    // repository
    #[serde(default)]
    pub repo: Option<RepoFacts>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    /// Repository update time, not reconciliation time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl UpdateRecord {
    /// Empty record for a never-seen component.
    pub fn new(config: &ComponentConfig, repository: impl Into<String>) -> Self {
        Self {
            slug: config.slug.clone(),
            repository: repository.into(),
            config: config.clone(),
            last_updated_at: None,
            serve_from: ServeFrom::Remote,
            name: None,
            author: None,
            author_profile: None,
            homepage: None,
            local_version: None,
            remote_version: None,
            package_url: None,
            changelog: None,
            release_url: None,
            icons: BTreeMap::new(),
            banners: BTreeMap::new(),
            requires_platform: None,
            requires_runtime: None,
            tested_up_to: None,
            readme_sections: IndexMap::new(),
            repo: None,
            added_at: None,
            updated_at: None,
            last_error: None,
        }
    }

    /// Overwrite the locally derived facts.
    pub fn apply_local(&mut self, meta: &InstalledMetadata) {
        self.name = Some(meta.name.clone());
        self.local_version = meta.version.clone();
        self.author = meta.author.clone();
        self.author_profile = meta.author_uri.clone();
        self.homepage = meta.homepage.clone();
    }

    /// Whether both records carry the same installed-copy facts.
    pub fn same_local_facts(&self, other: &UpdateRecord) -> bool {
        self.name == other.name
            && self.author == other.author
            && self.author_profile == other.author_profile
            && self.homepage == other.homepage
            && self.local_version == other.local_version
    }

    /// Whether the remote release is newer than the installed copy.
    ///
    /// Always false when pinned to local resolution or when either version is
    /// unknown.
    pub fn update_available(&self) -> bool {
        if self.serve_from == ServeFrom::Local {
            return false;
        }
        match (&self.local_version, &self.remote_version) {
            (Some(local), Some(remote)) => is_newer(local, remote),
            _ => false,
        }
    }

    /// Time since the last successful reconciliation, `None` if never.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_updated_at.map(|at| now - at)
    }

    /// State at `now` for a staleness threshold (refreshes in flight are
    /// tracked by the reconciler).
    pub fn state(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> RecordState {
        if self.last_error.is_some() {
            return RecordState::Error;
        }
        match self.age(now) {
            Some(age) if age < staleness => RecordState::Fresh,
            _ => RecordState::Stale,
        }
    }
}

/// Raw stored record map. Entries stay undecoded so a write never drops the
/// ones this build cannot read.
fn raw_records(store: &dyn KeyValueStore) -> Map<String, Value> {
    match store.get(RECORDS_KEY) {
        Some(Value::Object(map)) => map,
        Some(_) => {
            tracing::warn!(key = RECORDS_KEY, "Stored records are not a map, ignoring them");
            Map::new()
        }
        None => Map::new(),
    }
}

/// Read every persisted record. Entries that fail to decode are skipped.
pub fn load_records(store: &dyn KeyValueStore) -> BTreeMap<String, UpdateRecord> {
    raw_records(store)
        .into_iter()
        .filter_map(|(slug, value)| match serde_json::from_value(value) {
            Ok(record) => Some((slug, record)),
            Err(e) => {
                tracing::warn!(slug = %slug, "Skipping undecodable update record: {}", e);
                None
            }
        })
        .collect()
}

/// Read the persisted record for `slug`.
pub fn load_record(store: &dyn KeyValueStore, slug: &str) -> Option<UpdateRecord> {
    let value = raw_records(store).remove(slug)?;
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(slug, "Skipping undecodable update record: {}", e);
            None
        }
    }
}

/// Write one record, leaving every other stored entry as it is.
pub fn save_record(store: &dyn KeyValueStore, record: &UpdateRecord) -> UpdateResult<()> {
    let mut records = raw_records(store);
    records.insert(record.slug.clone(), serde_json::to_value(record)?);
    store.set(RECORDS_KEY, Value::Object(records))
}

/// Remove the record for `slug`; the key goes away with the last record.
/// Returns whether an entry existed.
pub fn remove_record(store: &dyn KeyValueStore, slug: &str) -> UpdateResult<bool> {
    let mut records = raw_records(store);
    let removed = records.remove(slug).is_some();
    if records.is_empty() {
        store.delete(RECORDS_KEY)?;
    } else if removed {
        store.set(RECORDS_KEY, Value::Object(records))?;
    }
    Ok(removed)
}
