//! Hub-facing seams: control surfaces and the status line
//!
//! The hub exposes a receiver to its users as two surfaces (volume and
//! source/power) plus a single status line. The bridge only knows the hub
//! through [`ControlHub`] and [`StatusReporter`]; user commands come back in
//! through the loop handle.

pub mod console;

pub use console::ConsoleHub;

/// Identifier handed out when a surface is registered
pub type SurfaceId = u64;

/// Volume scale reported to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeType {
    /// Decibels, negative towards silence
    Db,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Db => "db",
        }
    }
}

/// Source control state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Selected,
    Standby,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Selected => "selected",
            SourceStatus::Standby => "standby",
        }
    }
}

/// Volume surface as registered with the hub
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSurface {
    pub display_name: String,
    pub volume_type: VolumeType,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub value: i32,
    pub is_muted: bool,
}

/// Source/power surface as registered with the hub
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSurface {
    pub display_name: String,
    pub supports_standby: bool,
    pub status: SourceStatus,
}

/// Partial volume update (None = unchanged)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeUpdate {
    pub value: Option<i32>,
    pub is_muted: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceUpdate {
    pub status: SourceStatus,
}

/// How a set-volume value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMode {
    Absolute,
    Relative,
}

/// Answer returned to the hub for a user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failure(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// Surface registry exposed by the hub
///
/// Calls are synchronous: implementations queue or forward the update and
/// never block the caller on the network.
pub trait ControlHub: Send + Sync {
    fn register_volume(&self, surface: VolumeSurface) -> SurfaceId;

    fn register_source(&self, surface: SourceSurface) -> SurfaceId;

    fn update_volume(&self, id: SurfaceId, update: VolumeUpdate);

    fn update_source(&self, id: SurfaceId, update: SourceUpdate);

    /// Remove a registration (unknown ids are ignored)
    fn destroy(&self, id: SurfaceId);
}

/// Single connectivity status line shown to the user
pub trait StatusReporter: Send + Sync {
    fn set_status(&self, text: &str, is_error: bool);
}
