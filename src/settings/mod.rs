//! User-editable receiver settings
//!
//! One settings blob per gateway: the receiver address (empty = discover),
//! the input selected by the convenience switch, the display name, and the
//! inputs offered in the dropdown. Persisted by [`store::SettingsStore`],
//! edited through [`service::SettingsService`].

pub mod layout;
pub mod service;
pub mod store;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use layout::{make_layout, LayoutItem, SettingsLayout};
pub use service::{SaveResponse, SaveStatus, SettingsService};
pub use store::SettingsStore;

/// Name used until the receiver reports its model
pub const DEFAULT_DEVICE_NAME: &str = "Yamaha";

/// Input selected by the convenience switch out of the box
pub const DEFAULT_INPUT: &str = "coaxial";

/// Settings shared between the settings service and the reconciliation loop
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Dropdown entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputOption {
    pub title: String,
    pub value: String,
}

impl InputOption {
    /// Option whose title is the input id itself
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            value: id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Empty, or an IPv4 dotted quad
    #[serde(default)]
    pub receiver_url: String,
    #[serde(default = "default_input")]
    pub input: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_input_list")]
    pub input_list: Vec<InputOption>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            receiver_url: String::new(),
            input: default_input(),
            device_name: default_device_name(),
            input_list: default_input_list(),
        }
    }
}

impl Settings {
    /// Wrap in the shared handle used across tasks
    pub fn shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }

    /// True when `receiver_url` is empty or an IPv4 dotted quad
    pub fn is_valid(&self) -> bool {
        is_valid_receiver_url(&self.receiver_url)
    }

    /// Set one user-editable field by name
    pub fn set_field(&mut self, field: &str, value: &str) -> anyhow::Result<()> {
        match field {
            "receiver_url" => self.receiver_url = value.trim().to_string(),
            "input" => self.input = value.to_string(),
            "device_name" => self.device_name = value.to_string(),
            other => anyhow::bail!(
                "Unknown setting '{}' (expected device_name, input or receiver_url)",
                other
            ),
        }
        Ok(())
    }

    /// Derive the friendly name from the model unless the user renamed it
    ///
    /// Returns true when the name changed.
    pub fn apply_model_name(&mut self, model_name: &str) -> bool {
        if self.device_name != DEFAULT_DEVICE_NAME || model_name.is_empty() {
            return false;
        }
        self.device_name = format!("{} {}", DEFAULT_DEVICE_NAME, model_name);
        true
    }

    /// Rebuild the dropdown from the receiver's input ids
    ///
    /// An empty list leaves the current options in place. Returns true when
    /// the options changed.
    pub fn apply_input_ids(&mut self, ids: &[String]) -> bool {
        if ids.is_empty() {
            return false;
        }
        let options: Vec<InputOption> = ids.iter().map(|id| InputOption::new(id.as_str())).collect();
        if options == self.input_list {
            return false;
        }
        self.input_list = options;
        true
    }
}

/// True when `value` is empty or a dotted-quad IPv4 address
///
/// Format check only: four decimal octets, each 1-3 digits and at most 255.
/// Reachability is not checked.
pub fn is_valid_receiver_url(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }

    let octets: Vec<&str> = value.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            (1..=3).contains(&octet.len())
                && octet.bytes().all(|b| b.is_ascii_digit())
                && octet.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
        })
}

// Default value functions
fn default_input() -> String { DEFAULT_INPUT.to_string() }
fn default_device_name() -> String { DEFAULT_DEVICE_NAME.to_string() }
fn default_input_list() -> Vec<InputOption> { vec![InputOption::new(DEFAULT_INPUT)] }
