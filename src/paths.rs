//! Application path management for dev, portable and installed modes.
//!
//! ## Mode Detection
//!
//! - **Dev mode** (debug builds): `config.yaml` in the current working
//!   directory; state and logs live next to it.
//! - **Portable mode**: a `.portable` marker file next to the executable keeps
//!   every file in that directory.
//! - **Installed mode** (default): data lives in the platform data directory
//!   (`%APPDATA%\YXC GW`, `~/.local/share/YXC GW`, ...).
//!
//! The gateway config file is optional in every mode; a missing file means
//! built-in defaults.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "YXC GW";

/// Application paths for config, state, and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the gateway configuration file
    pub config: PathBuf,
    /// Path to the state directory (sled database)
    pub state_dir: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether files live next to the executable (or the dev checkout)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join("config.yaml").exists() {
                eprintln!(
                    "[paths] Running in DEV mode (config.yaml found in cwd: {})",
                    cwd.display()
                );
                return Self::in_dir(&cwd);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::in_dir(&exe_dir);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data dir, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!(
            "[paths] Running in INSTALLED mode (data dir: {})",
            app_data.display()
        );

        Self {
            config: app_data.join("config.yaml"),
            state_dir: app_data.join("state"),
            logs_dir: app_data.join("logs"),
            is_portable: false,
        }
    }

    /// Portable layout rooted at `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.yaml"),
            state_dir: dir.join(".state"),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Use an explicit config file, keeping the detected state and logs dirs
    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = config.into();
        self
    }

    /// Base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure the state and logs directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.state_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Sled database path (within state_dir)
    pub fn sled_db_path(&self) -> PathBuf {
        self.state_dir.join("sled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portable_layout() {
        let paths = AppPaths::in_dir(Path::new("test"));

        assert!(paths.is_portable);
        assert_eq!(paths.config, PathBuf::from("test/config.yaml"));
        assert_eq!(paths.sled_db_path(), PathBuf::from("test/.state/sled"));
        assert_eq!(paths.base_dir(), PathBuf::from("test"));
    }

    #[test]
    fn test_with_config_keeps_state_dir() {
        let paths = AppPaths::in_dir(Path::new("test")).with_config("/etc/yxc-gw.yaml");

        assert_eq!(paths.config, PathBuf::from("/etc/yxc-gw.yaml"));
        assert_eq!(paths.state_dir, PathBuf::from("test/.state"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp = tempfile::tempdir().unwrap();
        let paths = AppPaths::in_dir(temp.path());

        paths.ensure_directories().unwrap();
        assert!(paths.state_dir.is_dir());
        assert!(paths.logs_dir.is_dir());

        // Idempotent
        paths.ensure_directories().unwrap();
    }
}
