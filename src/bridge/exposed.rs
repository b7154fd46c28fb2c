//! Hub-visible mirror of the receiver state

use crate::drivers::ReceiverStatus;
use crate::hub::{SourceStatus, SourceSurface, VolumeMode, VolumeSurface, VolumeType};

/// Hub volume = device volume - offset
pub const DEVICE_VOLUME_OFFSET: i32 = 80;
pub const VOLUME_MIN: i32 = -80;
pub const VOLUME_MAX: i32 = 0;
pub const VOLUME_STEP: i32 = 1;

/// Last-known (or optimistically written) state shown to the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedState {
    pub volume: i32,
    /// False until a poll or an absolute write has set `volume`
    pub volume_known: bool,
    pub is_muted: bool,
    pub source: SourceStatus,
    /// Device volume cap reported by the receiver
    pub max_device_volume: Option<i32>,
}

impl Default for ExposedState {
    fn default() -> Self {
        Self {
            volume: VOLUME_MIN,
            volume_known: false,
            is_muted: false,
            source: SourceStatus::Selected,
            max_device_volume: None,
        }
    }
}

impl ExposedState {
    /// Resolve a set-volume request into a clamped hub volume
    ///
    /// Relative requests need a known base; `None` until one is available.
    pub fn volume_target(&self, mode: VolumeMode, value: i32) -> Option<i32> {
        let requested = match mode {
            VolumeMode::Absolute => value,
            VolumeMode::Relative if self.volume_known => self.volume.saturating_add(value),
            VolumeMode::Relative => return None,
        };
        Some(requested.clamp(VOLUME_MIN, VOLUME_MAX))
    }

    /// Record an optimistic volume write
    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume;
        self.volume_known = true;
    }

    /// Mirror a polled receiver status
    pub fn apply_status(&mut self, status: &ReceiverStatus) {
        self.set_volume(
            status
                .volume
                .saturating_sub(DEVICE_VOLUME_OFFSET)
                .clamp(VOLUME_MIN, VOLUME_MAX),
        );
        self.is_muted = status.mute;
        self.source = if status.is_powered_on() {
            SourceStatus::Selected
        } else {
            SourceStatus::Standby
        };
        if status.max_volume.is_some() {
            self.max_device_volume = status.max_volume;
        }
    }

    /// Raw device volume for a hub volume, capped at the receiver's maximum
    pub fn device_volume(&self, volume: i32) -> u16 {
        let mut raw = volume.saturating_add(DEVICE_VOLUME_OFFSET);
        if let Some(max) = self.max_device_volume {
            raw = raw.min(max);
        }
        u16::try_from(raw).unwrap_or(0)
    }

    pub fn volume_surface(&self, display_name: &str) -> VolumeSurface {
        VolumeSurface {
            display_name: display_name.to_string(),
            volume_type: VolumeType::Db,
            min: VOLUME_MIN,
            max: VOLUME_MAX,
            step: VOLUME_STEP,
            value: self.volume,
            is_muted: self.is_muted,
        }
    }

    pub fn source_surface(&self, display_name: &str) -> SourceSurface {
        SourceSurface {
            display_name: display_name.to_string(),
            supports_standby: true,
            status: self.source,
        }
    }
}
