//! Uplift Update - self-update coordinator for components released on GitHub.
//!
//! Keeps one persisted [`UpdateRecord`] per registered component by merging:
//! - repository, latest-release and asset queries against the hosting API
//!   (cached, rate-limit aware)
//! - facts about the installed copy
//! - the parsed readme of whichever release is relevant
//!
//! The host drives everything through [`Updater`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uplift_update::{ComponentConfig, FsInstall, JsonFileStore, Updater, UpdaterConfig};
//!
//! let updater = Updater::builder(UpdaterConfig::load(), Arc::new(FsInstall::new("/srv/plugins")))
//!     .store(Arc::new(JsonFileStore::open_default()?))
//!     .build();
//! updater.register(ComponentConfig::new("widget/widget.php", "acme/widget"))?;
//!
//! let check = updater.on_check_for_updates().await;
//! for (slug, offer) in &check.response {
//!     println!("{slug}: {} available at {:?}", offer.new_version, offer.download_url);
//! }
//! ```

mod breaker;
mod cache;
mod clock;
mod config;
mod error;
mod github;
mod local;
mod locator;
mod notice;
mod reconciler;
mod record;
mod registry;
mod staging;
mod store;
mod transport;
mod updater;
mod version;

pub use breaker::{QuotaHeaders, RATE_LIMIT_KEY, RateLimitBreaker};
pub use cache::{CacheEntry, Fingerprint, ResponseCache, TtlClass};
pub use clock::{Clock, SystemClock};
pub use config::{ComponentConfig, UpdaterConfig, slug_directory};
pub use error::{FetchError, UpdateError, UpdateResult};
pub use github::{
    Artwork, ContentEntry, Fetched, GitHubClient, Owner, Release, ReleaseAsset, Repository,
};
pub use local::{FsInstall, InstalledMetadata, LocalInstall, LocalReadme};
pub use locator::RepoLocator;
pub use notice::{ERRORS_KEY, ErrorBook, ErrorNotice, Notifier, TracingNotifier};
pub use reconciler::Reconciler;
pub use record::{RECORDS_KEY, RecordState, RepoFacts, ServeFrom, UpdateRecord};
pub use registry::Registry;
pub use staging::{DirectoryMover, FsMover, Stager, StagingOutcome};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use updater::{
    Contributor, PluginInfo, SOURCE_LABEL, UpdateCheck, UpdateOffer, Updater, UpdaterBuilder,
};
pub use version::{VersionComparison, compare_versions, is_newer, is_valid_version};
