//! Facts about the installed copy of a component.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::slug_directory;

/// Markdown readme, preferred when present
pub const MARKDOWN_README: &str = "README.md";

/// Entry-file bytes scanned for header fields
const HEADER_SCAN_BYTES: u64 = 8 * 1024;

/// Header fields of an installed component's entry file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstalledMetadata {
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub author_uri: Option<String>,
    pub homepage: Option<String>,
    pub requires_runtime: Option<String>,
    pub requires_platform: Option<String>,
}

/// Readme shipped with the installed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReadme {
    /// File name as found (`README.md` or `readme.txt`)
    pub file_name: String,
    pub text: String,
}

impl LocalReadme {
    pub fn is_markdown(&self) -> bool {
        self.file_name == MARKDOWN_README
    }
}

/// Host view of installed components.
pub trait LocalInstall: Send + Sync {
    /// Metadata for `slug`, `None` when it is not installed.
    fn metadata(&self, slug: &str) -> Option<InstalledMetadata>;

    /// Readme shipped with `slug`, if any.
    fn readme(&self, slug: &str) -> Option<LocalReadme>;
}

/// Reads installed components from a plugins directory
/// (`<root>/<dir>/<file>.php`).
#[derive(Debug, Clone)]
pub struct FsInstall {
    root: PathBuf,
}

impl FsInstall {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_header(path: &Path) -> std::io::Result<String> {
        let mut buf = Vec::new();
        std::fs::File::open(path)?
            .take(HEADER_SCAN_BYTES)
            .read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl LocalInstall for FsInstall {
    fn metadata(&self, slug: &str) -> Option<InstalledMetadata> {
        let path = self.root.join(slug);
        let header = match Self::read_header(&path) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!(slug, "No installed entry file: {}", e);
                return None;
            }
        };

        let field = |key: &str| uplift_readme::header_field(&header, key);
        Some(InstalledMetadata {
            name: field("Plugin Name")?,
            version: field("Version"),
            author: field("Author"),
            author_uri: field("Author URI"),
            homepage: field("Plugin URI"),
            requires_runtime: field(uplift_readme::REQUIRES_RUNTIME),
            requires_platform: field(uplift_readme::REQUIRES_PLATFORM),
        })
    }

    fn readme(&self, slug: &str) -> Option<LocalReadme> {
        let dir = self.root.join(slug_directory(slug));
        [MARKDOWN_README, crate::config::DEFAULT_README_FILE]
            .into_iter()
            .find_map(|file_name| {
                let text = std::fs::read_to_string(dir.join(file_name)).ok()?;
                Some(LocalReadme {
                    file_name: file_name.to_string(),
                    text,
                })
            })
    }
}
