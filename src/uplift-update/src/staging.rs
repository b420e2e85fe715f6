//! Package staging: rename an extracted release folder to the directory the
//! host installer expects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ComponentConfig, slug_directory};
use crate::record::load_records;
use crate::registry::Registry;
use crate::store::KeyValueStore;

/// Filesystem move used to relocate an extracted package.
pub trait DirectoryMover: Send + Sync {
    /// Move `src` to `dst`. Returns false when nothing was moved.
    fn move_dir(&self, src: &Path, dst: &Path, overwrite: bool) -> bool;
}

/// Moves directories on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl FsMover {
    fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dst)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            let target = dst.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                Self::copy_tree(&entry.path(), &target)?;
            } else {
                std::fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    fn try_move(src: &Path, dst: &Path, overwrite: bool) -> std::io::Result<()> {
        if dst.exists() {
            if !overwrite {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", dst.display()),
                ));
            }
            std::fs::remove_dir_all(dst)?;
        }

        if std::fs::rename(src, dst).is_ok() {
            return Ok(());
        }

        // rename fails across filesystems
        Self::copy_tree(src, dst)?;
        std::fs::remove_dir_all(src)
    }
}

impl DirectoryMover for FsMover {
    fn move_dir(&self, src: &Path, dst: &Path, overwrite: bool) -> bool {
        match Self::try_move(src, dst, overwrite) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Failed to move {} to {}: {}",
                    src.display(),
                    dst.display(),
                    e
                );
                false
            }
        }
    }
}

/// Result of a relocation attempt. Every variant carries the path the
/// installer should continue with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingOutcome {
    /// Renamed to the expected directory
    Relocated(PathBuf),
    /// No registered component matched; path unchanged
    NotOurs(PathBuf),
    /// A component matched but the move failed; path unchanged
    MoveFailed(PathBuf),
}

impl StagingOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Relocated(path) | Self::NotOurs(path) | Self::MoveFailed(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Relocated(path) | Self::NotOurs(path) | Self::MoveFailed(path) => path,
        }
    }

    pub fn is_relocated(&self) -> bool {
        matches!(self, Self::Relocated(_))
    }
}

/// Matches extracted archives to registered components and moves them into
/// place. Reads records, never writes them.
pub struct Stager {
    registry: Arc<Registry>,
    store: Arc<dyn KeyValueStore>,
    mover: Arc<dyn DirectoryMover>,
}

impl Stager {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn KeyValueStore>,
        mover: Arc<dyn DirectoryMover>,
    ) -> Self {
        Self {
            registry,
            store,
            mover,
        }
    }

    /// Registered components first, then components only known from their
    /// persisted records.
    fn candidates(&self) -> Vec<ComponentConfig> {
        let mut candidates = self.registry.configs();
        for (slug, record) in load_records(self.store.as_ref()) {
            if !candidates.iter().any(|config| config.slug == slug) {
                candidates.push(record.config);
            }
        }
        candidates
    }

    /// Component whose `owner-repo` prefix occurs in the extracted folder name.
    pub fn find_owner(&self, extracted: &Path) -> Option<ComponentConfig> {
        let name = extracted
            .file_name()
            .map_or_else(|| extracted.to_string_lossy(), |name| name.to_string_lossy())
            .to_lowercase();

        self.candidates().into_iter().find(|config| {
            config
                .locator()
                .is_ok_and(|locator| name.contains(&locator.archive_prefix()))
        })
    }

    /// Relocate `extracted` to `<parent>/<directory of expected_slug>/`.
    ///
    /// An empty `expected_slug` uses the matched component's own slug.
    pub fn relocate(&self, extracted: &Path, expected_slug: &str) -> StagingOutcome {
        let Some(config) = self.find_owner(extracted) else {
            tracing::info!(path = %extracted.display(), "Extracted package matches no registered component");
            return StagingOutcome::NotOurs(extracted.to_path_buf());
        };

        let slug = if expected_slug.is_empty() {
            config.slug.as_str()
        } else {
            expected_slug
        };
        let parent = extracted.parent().unwrap_or_else(|| Path::new(""));
        let target = parent.join(format!("{}/", slug_directory(slug)));

        if self.mover.move_dir(extracted, &target, false) {
            tracing::info!(
                slug = %config.slug,
                from = %extracted.display(),
                to = %target.display(),
                "Relocated extracted package"
            );
            StagingOutcome::Relocated(target)
        } else {
            StagingOutcome::MoveFailed(extracted.to_path_buf())
        }
    }
}
