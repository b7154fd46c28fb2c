//! Settings persistence using sled
//!
//! The whole [`Settings`] value is stored as one JSON blob under a single key.
//! Writes go through `spawn_blocking` so the runtime never waits on disk.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, trace, warn};

use super::Settings;

/// Key used to store the settings blob in sled
const SETTINGS_KEY: &[u8] = b"settings";

/// Handle to the settings database (cheap to clone)
#[derive(Clone)]
pub struct SettingsStore {
    db: sled::Db,
}

impl SettingsStore {
    /// Open (or create) the settings database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("Failed to open sled database at: {}", path.display()))?;

        debug!("Settings store opened at: {}", path.display());
        Ok(Self { db })
    }

    /// Load the stored settings
    ///
    /// Returns `Ok(None)` when nothing was ever saved.
    pub fn load(&self) -> Result<Option<Settings>> {
        let Some(data) = self
            .db
            .get(SETTINGS_KEY)
            .context("Failed to read settings from sled")?
        else {
            return Ok(None);
        };

        let settings = serde_json::from_slice::<Settings>(&data)
            .context("Failed to deserialize stored settings")?;
        Ok(Some(settings))
    }

    /// Load the stored settings, falling back to defaults
    ///
    /// A corrupt blob is logged and replaced by defaults on the next save.
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(Some(settings)) => {
                debug!("Loaded stored settings (receiver_url: '{}')", settings.receiver_url);
                settings
            }
            Ok(None) => {
                debug!("No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!("⚠️  Could not load stored settings, using defaults: {:#}", e);
                Settings::default()
            }
        }
    }

    /// Persist the settings blob and flush it to disk
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_vec(settings).context("Failed to serialize settings")?;
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            db.insert(SETTINGS_KEY, json)?;
            db.flush()?;
            Ok::<_, sled::Error>(())
        })
        .await
        .context("Settings write task panicked")?
        .context("Failed to write settings to sled")?;

        trace!("Settings written to sled");
        Ok(())
    }
}
