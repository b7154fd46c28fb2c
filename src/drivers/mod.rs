//! Receiver drivers (Yamaha YXC over HTTP)
//!
//! The reconciliation loop only talks to a receiver through [`ReceiverDriver`].
//! Every call is independent and may fail on its own; the loop decides what a
//! failure means for the binding.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

pub mod ssdp;
pub mod yxc;

pub use yxc::YxcDriver;

/// Errors returned by receiver drivers
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport-level failure (connection refused, timeout, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Receiver answered with a non-2xx HTTP status
    #[error("receiver returned HTTP {status} for {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Receiver answered but the YXC `response_code` was not 0
    #[error("receiver rejected {endpoint} (response_code {code})")]
    Rejected { endpoint: String, code: i64 },

    /// Body could not be decoded
    #[error("failed to decode receiver response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No address known yet (discovery has not succeeded)
    #[error("receiver address unknown, discovery has not completed")]
    NotDiscovered,

    /// SSDP search failed or nobody answered
    #[error("discovery failed: {0}")]
    Discovery(String),
}

/// Power states accepted by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    On,
    Standby,
}

impl Power {
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::On => "on",
            Power::Standby => "standby",
        }
    }
}

/// Main zone status (`main/getStatus`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReceiverStatus {
    pub power: String,
    /// Raw device volume (0 = minimum)
    pub volume: i32,
    pub mute: bool,
    /// Highest device volume the receiver accepts, when reported
    #[serde(default)]
    pub max_volume: Option<i32>,
}

impl ReceiverStatus {
    pub fn is_powered_on(&self) -> bool {
        self.power == Power::On.as_str()
    }
}

/// Device information (`system/getDeviceInfo`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceInfo {
    pub model_name: String,
}

/// Feature list (`system/getFeatures`), reduced to what the bridge needs
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Features {
    pub system: SystemFeatures,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemFeatures {
    #[serde(default)]
    pub input_list: Vec<FeatureInput>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureInput {
    pub id: String,
}

impl Features {
    /// Input identifiers in the order the receiver reports them
    pub fn input_ids(&self) -> Vec<String> {
        self.system
            .input_list
            .iter()
            .map(|input| input.id.clone())
            .collect()
    }
}

/// Driver trait - the receiver operations the bridge relies on
///
/// Write operations are fire-and-forget from the bridge's point of view; their
/// result is only logged.
#[async_trait]
pub trait ReceiverDriver: Send + Sync {
    /// Locate the receiver and return its address
    async fn discover(&self) -> Result<String, DriverError>;

    async fn get_status(&self) -> Result<ReceiverStatus, DriverError>;

    async fn get_device_info(&self) -> Result<DeviceInfo, DriverError>;

    async fn get_features(&self) -> Result<Features, DriverError>;

    /// Set the raw device volume
    async fn set_volume_to(&self, volume: u16) -> Result<(), DriverError>;

    async fn mute(&self, muted: bool) -> Result<(), DriverError>;

    async fn power(&self, power: Power) -> Result<(), DriverError>;

    async fn set_input(&self, input: &str) -> Result<(), DriverError>;
}

/// Builds a fresh driver for the configured receiver address (empty = discover)
pub type DriverFactory = Arc<dyn Fn(&str) -> Arc<dyn ReceiverDriver> + Send + Sync>;
