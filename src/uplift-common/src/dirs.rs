//! Application directories for the updater.
//!
//! - Linux/macOS: `~/.uplift`
//! - Windows: `%APPDATA%\uplift`
//!
//! Can be overridden with the `UPLIFT_HOME` environment variable.

use std::path::PathBuf;

/// Application name for directory paths
pub const APP_NAME: &str = "uplift";

/// Primary home directory name on Linux/macOS
pub const HOME_DIR_NAME: &str = ".uplift";

/// Environment variable overriding every directory
pub const HOME_ENV_VAR: &str = "UPLIFT_HOME";

/// Application directories structure
#[derive(Debug, Clone)]
pub struct AppDirs {
    /// Configuration directory (`updater.json` lives here)
    pub config_dir: PathBuf,
    /// Data directory (persisted update records)
    pub data_dir: PathBuf,
}

impl AppDirs {
    /// Get application directories, respecting `UPLIFT_HOME`.
    ///
    /// Relative override paths are resolved against the current directory so
    /// state never lands somewhere unexpected.
    pub fn new() -> Option<Self> {
        if let Ok(home) = std::env::var(HOME_ENV_VAR) {
            let home = PathBuf::from(&home);
            let home = if home.is_relative() {
                let cwd = std::env::current_dir().ok()?;
                let resolved = cwd.join(&home);
                resolved.canonicalize().unwrap_or(resolved)
            } else {
                home
            };
            return Some(Self {
                config_dir: home.clone(),
                data_dir: home,
            });
        }

        #[cfg(target_os = "windows")]
        let root = dirs::config_dir()?.join(APP_NAME);

        #[cfg(not(target_os = "windows"))]
        let root = dirs::home_dir()?.join(HOME_DIR_NAME);

        Some(Self {
            config_dir: root.clone(),
            data_dir: root,
        })
    }

    /// Path of the updater configuration file
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("updater.json")
    }

    /// Path of the persisted key-value store
    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Ensure all directories exist, owner-only on Unix
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
                }
            }
        }
        Ok(())
    }
}

/// Get application directories (convenience function)
pub fn get_app_dirs() -> Option<AppDirs> {
    AppDirs::new()
}
