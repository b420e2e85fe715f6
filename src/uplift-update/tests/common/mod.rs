//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use uplift_update::{
    Clock, ComponentConfig, ErrorNotice, HttpRequest, HttpResponse, HttpTransport,
    InstalledMetadata, LocalInstall, LocalReadme, MemoryStore, Notifier, TransportError, Updater,
    UpdaterConfig,
};

pub const BASE: &str = "https://api.test";
pub const SLUG: &str = "widget/widget.php";
pub const REPO: &str = "/repos/acme/widget";
pub const RELEASE: &str = "/repos/acme/widget/releases/latest";
pub const ASSETS: &str = "/repos/acme/widget/contents/.wordpress-org/";
pub const README_TXT: &str = "/repos/acme/widget/contents/readme.txt";
pub const README_MD: &str = "/repos/acme/widget/contents/README.md";

/// Start of every test timeline
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(epoch())))
    }

    pub fn advance(&self, secs: i64) {
        *self.0.lock() += Duration::seconds(secs);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Serves canned responses by URL path and counts every request.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<HashMap<String, Result<HttpResponse, TransportError>>>,
    calls: Mutex<Vec<String>>,
}

impl RoutedTransport {
    pub fn route(&self, path: &str, status: u16, body: impl Into<String>) {
        self.route_response(
            path,
            HttpResponse {
                status,
                headers: BTreeMap::new(),
                body: body.into(),
            },
        );
    }

    pub fn route_response(&self, path: &str, response: HttpResponse) {
        self.routes.lock().insert(path.to_string(), Ok(response));
    }

    pub fn route_error(&self, path: &str, error: TransportError) {
        self.routes.lock().insert(path.to_string(), Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl HttpTransport for RoutedTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = request
            .url
            .strip_prefix(BASE)
            .unwrap_or(request.url.as_str())
            .to_string();
        self.calls.lock().push(path.clone());
        self.routes.lock().get(&path).cloned().unwrap_or_else(|| {
            Ok(HttpResponse {
                status: 404,
                headers: BTreeMap::new(),
                body: r#"{"message": "Not Found"}"#.to_string(),
            })
        })
    }
}

/// Installed components held in memory.
#[derive(Default)]
pub struct StaticInstall {
    metadata: Mutex<HashMap<String, InstalledMetadata>>,
    readmes: Mutex<HashMap<String, LocalReadme>>,
}

impl StaticInstall {
    pub fn install(&self, slug: &str, version: &str) {
        self.metadata.lock().insert(
            slug.to_string(),
            InstalledMetadata {
                name: "Widget".to_string(),
                version: Some(version.to_string()),
                author: Some("Acme".to_string()),
                author_uri: Some("https://acme.test".to_string()),
                homepage: Some("https://acme.test/widget".to_string()),
                requires_runtime: Some("7.0".to_string()),
                requires_platform: Some("5.0".to_string()),
            },
        );
    }

    pub fn ship_readme(&self, slug: &str, file_name: &str, text: &str) {
        self.readmes.lock().insert(
            slug.to_string(),
            LocalReadme {
                file_name: file_name.to_string(),
                text: text.to_string(),
            },
        );
    }
}

impl LocalInstall for StaticInstall {
    fn metadata(&self, slug: &str) -> Option<InstalledMetadata> {
        self.metadata.lock().get(slug).cloned()
    }

    fn readme(&self, slug: &str) -> Option<LocalReadme> {
        self.readmes.lock().get(slug).cloned()
    }
}

#[derive(Default)]
pub struct CollectingNotifier {
    pub notices: Mutex<Vec<ErrorNotice>>,
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: &ErrorNotice) {
        self.notices.lock().push(notice.clone());
    }
}

pub fn repo_json() -> String {
    json!({
        "name": "widget",
        "description": "A very fine widget",
        "html_url": "https://github.com/acme/widget",
        "created_at": "2021-03-01T10:00:00Z",
        "updated_at": "2024-05-02T12:30:00Z",
        "owner": {
            "login": "acme",
            "html_url": "https://github.com/acme",
            "avatar_url": "https://avatars.test/acme.png"
        }
    })
    .to_string()
}

pub fn release_json(tag: &str) -> String {
    json!({
        "tag_name": tag,
        "body": "Fixed the sprockets.",
        "html_url": format!("https://github.com/acme/widget/releases/tag/{}", tag),
        "zipball_url": format!("https://api.test/repos/acme/widget/zipball/{}", tag),
        "assets": [
            {
                "name": "widget.zip",
                "content_type": "application/octet-stream",
                "browser_download_url": format!("https://github.com/acme/widget/releases/download/{}/widget.zip", tag)
            }
        ]
    })
    .to_string()
}

pub fn assets_json() -> String {
    json!([
        {"name": "icon-256x256.png", "type": "file", "download_url": "https://raw.test/icon-256x256.png"},
        {"name": "banner-1544x500.png", "type": "file", "download_url": "https://raw.test/banner-1544x500.png"}
    ])
    .to_string()
}

pub fn readme_json(text: &str) -> String {
    let content = base64::engine::general_purpose::STANDARD.encode(text);
    json!({"name": "readme.txt", "encoding": "base64", "content": content}).to_string()
}

pub const REMOTE_README: &str = "=== Widget ===\n\
Requires at least: 6.1\n\
Tested up to: 6.5\n\
Requires PHP: 8.0\n\
Stable tag: 1.1.0\n\
\n\
== Description ==\n\
Widget does things.\n\
\n\
== Changelog ==\n\
= 1.1.0 =\n\
* Sprockets\n";

pub const LOCAL_README: &str = "=== Widget ===\n\
Requires at least: 6.0\n\
Tested up to: 6.4\n\
Stable tag: 1.0.0\n\
\n\
== Description ==\n\
Installed copy.\n";

/// Hosting API with one release `tag` and all optional resources present.
pub fn serve_release(transport: &RoutedTransport, tag: &str) {
    transport.route(REPO, 200, repo_json());
    transport.route(RELEASE, 200, release_json(tag));
    transport.route(ASSETS, 200, assets_json());
    transport.route(README_TXT, 200, readme_json(REMOTE_README));
}

pub fn test_config() -> UpdaterConfig {
    UpdaterConfig {
        api_base_url: BASE.to_string(),
        token: None,
        ttl_jitter_secs: 0,
        ..Default::default()
    }
}

pub struct Harness {
    pub updater: Updater,
    pub transport: Arc<RoutedTransport>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub install: Arc<StaticInstall>,
    pub notifier: Arc<CollectingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: UpdaterConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Fresh updater over an existing store, as after a host restart.
    pub fn with_store(config: UpdaterConfig, store: Arc<MemoryStore>) -> Self {
        let transport = Arc::new(RoutedTransport::default());
        let clock = ManualClock::new();
        let install = Arc::new(StaticInstall::default());
        let notifier = Arc::new(CollectingNotifier::default());

        let updater = Updater::builder(config, install.clone())
            .transport(transport.clone())
            .store(store.clone())
            .clock(clock.clone())
            .notifier(notifier.clone())
            .build();

        Self {
            updater,
            transport,
            clock,
            store,
            install,
            notifier,
        }
    }

    /// Register the widget component installed at `version`.
    pub fn widget(&self, version: &str) {
        self.install.install(SLUG, version);
        self.updater
            .register(ComponentConfig::new(SLUG, "acme/widget"))
            .unwrap();
    }
}
