//! Settings service - get/save handlers behind the hub's settings form

use tracing::{info, warn};

use super::{make_layout, Settings, SettingsLayout, SettingsStore, SharedSettings};
use crate::bridge::LoopHandle;

/// Outcome reported to the hub for a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Success,
    NotValid,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Success => "Success",
            SaveStatus::NotValid => "NotValid",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveResponse {
    pub status: SaveStatus,
    pub layout: SettingsLayout,
}

/// Validates, persists and applies settings edits
#[derive(Clone)]
pub struct SettingsService {
    store: SettingsStore,
    settings: SharedSettings,
    loop_handle: Option<LoopHandle>,
}

impl SettingsService {
    pub fn new(store: SettingsStore, settings: SharedSettings) -> Self {
        Self {
            store,
            settings,
            loop_handle: None,
        }
    }

    /// Attach the reconciliation loop so address changes trigger a rebind
    pub fn with_loop(mut self, handle: LoopHandle) -> Self {
        self.loop_handle = Some(handle);
        self
    }

    /// Render the form for the current settings
    pub fn get_settings(&self) -> SettingsLayout {
        make_layout(self.settings.read().clone())
    }

    /// Current settings snapshot
    pub fn current(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Validate `values` and, unless invalid or a dry run, apply and persist them
    ///
    /// The rendered layout is always returned so the form can show errors.
    pub async fn save_settings(&self, values: Settings, dry_run: bool) -> SaveResponse {
        let layout = make_layout(values);

        if layout.has_error {
            return SaveResponse {
                status: SaveStatus::NotValid,
                layout,
            };
        }

        if dry_run {
            return SaveResponse {
                status: SaveStatus::Success,
                layout,
            };
        }

        let previous_url = {
            let mut settings = self.settings.write();
            std::mem::replace(&mut *settings, layout.values.clone()).receiver_url
        };
        info!("💾 Settings saved (receiver: '{}')", layout.values.receiver_url);

        if let Err(e) = self.store.save(&layout.values).await {
            warn!("⚠️  Settings applied but not persisted: {:#}", e);
        }

        if previous_url != layout.values.receiver_url {
            if let Some(handle) = &self.loop_handle {
                info!("🔄 Receiver address changed, rebinding");
                handle.rebind();
            }
        }

        SaveResponse {
            status: SaveStatus::Success,
            layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::layout::INVALID_IP_MESSAGE;
    use tempfile::tempdir;

    fn service() -> (SettingsService, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let store = SettingsStore::open(temp.path().join("sled")).unwrap();
        (SettingsService::new(store, Settings::default().shared()), temp)
    }

    #[tokio::test]
    async fn test_invalid_address_is_not_persisted() {
        let (service, _temp) = service();
        let values = Settings {
            receiver_url: "999.1.1.1".to_string(),
            ..Settings::default()
        };

        let response = service.save_settings(values, false).await;

        assert_eq!(response.status, SaveStatus::NotValid);
        assert_eq!(response.layout.field_error("receiver_url"), Some(INVALID_IP_MESSAGE));
        assert_eq!(service.current(), Settings::default());
        assert!(service.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dry_run_validates_without_applying() {
        let (service, _temp) = service();
        let values = Settings {
            receiver_url: "192.168.1.20".to_string(),
            ..Settings::default()
        };

        let response = service.save_settings(values, true).await;

        assert_eq!(response.status, SaveStatus::Success);
        assert_eq!(service.current().receiver_url, "");
        assert!(service.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_valid_save_applies_and_persists() {
        let (service, _temp) = service();
        let values = Settings {
            receiver_url: "192.168.1.20".to_string(),
            input: "hdmi1".to_string(),
            ..Settings::default()
        };

        let response = service.save_settings(values.clone(), false).await;

        assert_eq!(response.status, SaveStatus::Success);
        assert!(!response.layout.has_error);
        assert_eq!(service.current(), values);
        assert_eq!(service.store.load().unwrap(), Some(values));
    }

    #[tokio::test]
    async fn test_get_settings_renders_current_values() {
        let (service, _temp) = service();
        let layout = service.get_settings();
        assert!(!layout.has_error);
        assert_eq!(layout.values, Settings::default());
    }
}
