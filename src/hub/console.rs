//! Console hub - logs every surface change and keeps a mirror for the REPL
//!
//! Stands in for a real media-control hub: registrations, updates and status
//! lines are logged, and the latest view is kept so the console can print it.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::{
    ControlHub, SourceSurface, SourceUpdate, StatusReporter, SurfaceId, VolumeSurface,
    VolumeUpdate,
};

/// Last status line reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
    /// When this text was first reported
    pub since: DateTime<Local>,
}

/// ConsoleHub logs all hub traffic to console/logs
pub struct ConsoleHub {
    next_id: AtomicU64,
    volumes: RwLock<BTreeMap<SurfaceId, VolumeSurface>>,
    sources: RwLock<BTreeMap<SurfaceId, SourceSurface>>,
    status: RwLock<Option<StatusLine>>,
}

impl ConsoleHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            volumes: RwLock::new(BTreeMap::new()),
            sources: RwLock::new(BTreeMap::new()),
            status: RwLock::new(None),
        }
    }

    fn allocate_id(&self) -> SurfaceId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn status(&self) -> Option<StatusLine> {
        self.status.read().clone()
    }

    /// Human-readable summary of everything currently registered
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();

        match self.status() {
            Some(status) => lines.push(format!(
                "status: {}{} (since {})",
                status.text,
                if status.is_error { " (error)" } else { "" },
                status.since.format("%H:%M:%S")
            )),
            None => lines.push("status: (none)".to_string()),
        }

        for (id, volume) in self.volumes.read().iter() {
            lines.push(format!(
                "volume #{} '{}': {} {} [{}..{} step {}]{}",
                id,
                volume.display_name,
                volume.value,
                volume.volume_type.as_str(),
                volume.min,
                volume.max,
                volume.step,
                if volume.is_muted { " muted" } else { "" }
            ));
        }

        for (id, source) in self.sources.read().iter() {
            lines.push(format!(
                "source #{} '{}': {}",
                id,
                source.display_name,
                source.status.as_str()
            ));
        }

        if lines.len() == 1 {
            lines.push("no surfaces registered".to_string());
        }

        lines.join("\n")
    }
}

impl Default for ConsoleHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHub for ConsoleHub {
    fn register_volume(&self, surface: VolumeSurface) -> SurfaceId {
        let id = self.allocate_id();
        info!(
            "🔊 Volume control #{} registered: '{}' ({} {})",
            id,
            surface.display_name,
            surface.value,
            surface.volume_type.as_str()
        );
        self.volumes.write().insert(id, surface);
        id
    }

    fn register_source(&self, surface: SourceSurface) -> SurfaceId {
        let id = self.allocate_id();
        info!(
            "🔌 Source control #{} registered: '{}' ({})",
            id,
            surface.display_name,
            surface.status.as_str()
        );
        self.sources.write().insert(id, surface);
        id
    }

    fn update_volume(&self, id: SurfaceId, update: VolumeUpdate) {
        let mut volumes = self.volumes.write();
        let Some(surface) = volumes.get_mut(&id) else {
            warn!("Volume update for unknown control #{}", id);
            return;
        };

        if let Some(value) = update.value {
            surface.value = value;
        }
        if let Some(is_muted) = update.is_muted {
            surface.is_muted = is_muted;
        }
        debug!(
            "Volume #{} → {} {}{}",
            id,
            surface.value,
            surface.volume_type.as_str(),
            if surface.is_muted { " (muted)" } else { "" }
        );
    }

    fn update_source(&self, id: SurfaceId, update: SourceUpdate) {
        let mut sources = self.sources.write();
        let Some(surface) = sources.get_mut(&id) else {
            warn!("Source update for unknown control #{}", id);
            return;
        };

        if surface.status != update.status {
            debug!("Source #{} → {}", id, update.status.as_str());
        }
        surface.status = update.status;
    }

    fn destroy(&self, id: SurfaceId) {
        let removed = self.volumes.write().remove(&id).is_some()
            || self.sources.write().remove(&id).is_some();
        if removed {
            info!("🗑️  Control #{} removed", id);
        }
    }
}

impl StatusReporter for ConsoleHub {
    fn set_status(&self, text: &str, is_error: bool) {
        let mut status = self.status.write();
        if let Some(current) = status.as_ref() {
            if current.text == text && current.is_error == is_error {
                return;
            }
        }

        if is_error {
            warn!("⚠️  Status: {}", text);
        } else {
            info!("📡 Status: {}", text);
        }
        *status = Some(StatusLine {
            text: text.to_string(),
            is_error,
            since: Local::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{SourceStatus, VolumeType};

    fn volumes(hub: &ConsoleHub) -> Vec<VolumeSurface> {
        hub.volumes.read().values().cloned().collect()
    }

    fn sources(hub: &ConsoleHub) -> Vec<SourceSurface> {
        hub.sources.read().values().cloned().collect()
    }

    fn volume_surface() -> VolumeSurface {
        VolumeSurface {
            display_name: "Yamaha".to_string(),
            volume_type: VolumeType::Db,
            min: -80,
            max: 0,
            step: 1,
            value: -40,
            is_muted: false,
        }
    }

    #[test]
    fn test_register_update_destroy() {
        let hub = ConsoleHub::new();
        let volume = hub.register_volume(volume_surface());
        let source = hub.register_source(SourceSurface {
            display_name: "Yamaha".to_string(),
            supports_standby: true,
            status: SourceStatus::Standby,
        });
        assert_ne!(volume, source);

        hub.update_volume(
            volume,
            VolumeUpdate {
                value: Some(-30),
                is_muted: Some(true),
            },
        );
        hub.update_source(source, SourceUpdate { status: SourceStatus::Selected });

        assert_eq!(volumes(&hub)[0].value, -30);
        assert!(volumes(&hub)[0].is_muted);
        assert_eq!(sources(&hub)[0].status, SourceStatus::Selected);

        hub.destroy(volume);
        hub.destroy(source);
        assert!(volumes(&hub).is_empty());
        assert!(sources(&hub).is_empty());
    }

    #[test]
    fn test_partial_volume_update_keeps_other_fields() {
        let hub = ConsoleHub::new();
        let id = hub.register_volume(volume_surface());

        hub.update_volume(id, VolumeUpdate { value: None, is_muted: Some(true) });

        let surface = &volumes(&hub)[0];
        assert_eq!(surface.value, -40);
        assert!(surface.is_muted);
    }

    #[test]
    fn test_updates_for_unknown_ids_are_ignored() {
        let hub = ConsoleHub::new();
        hub.update_volume(42, VolumeUpdate::default());
        hub.update_source(42, SourceUpdate { status: SourceStatus::Standby });
        hub.destroy(42);
        assert!(volumes(&hub).is_empty());
    }

    #[test]
    fn test_status_and_describe() {
        let hub = ConsoleHub::new();
        assert!(hub.describe().contains("no surfaces registered"));

        hub.set_status("Found Yamaha device at 10.0.0.5", false);
        hub.register_volume(volume_surface());

        let text = hub.describe();
        assert!(text.contains("status: Found Yamaha device at 10.0.0.5"));
        assert!(text.contains("'Yamaha': -40 db"));

        hub.set_status("Could not find Yamaha device for setup.", true);
        let status = hub.status().unwrap();
        assert_eq!(status.text, "Could not find Yamaha device for setup.");
        assert!(status.is_error);
        assert!(hub.describe().contains("(error)"));
    }

    #[test]
    fn test_repeated_status_keeps_timestamp() {
        let hub = ConsoleHub::new();
        hub.set_status("Initializing.", false);
        let first = hub.status().unwrap().since;

        hub.set_status("Initializing.", false);
        assert_eq!(hub.status().unwrap().since, first);
    }
}
