//! Settings form rendering and validation

use serde::Serialize;

use super::{InputOption, Settings};

/// Error shown under the receiver address field
pub const INVALID_IP_MESSAGE: &str = "Please enter a valid IP-address";

const DEVICE_NAME_SUBTITLE: &str = "Changing this might take some time to take effect.";
const RECEIVER_URL_SUBTITLE: &str = "Your device should be recognized automatically. \
     If not, please configure your receiver to use a fixed IP-address.";

/// One form field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutItem {
    #[serde(rename = "string")]
    Text {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        setting: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Dropdown {
        title: String,
        values: Vec<InputOption>,
        setting: String,
    },
}

impl LayoutItem {
    /// Settings key this field edits
    pub fn setting(&self) -> &str {
        match self {
            LayoutItem::Text { setting, .. } | LayoutItem::Dropdown { setting, .. } => setting,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LayoutItem::Text { error, .. } => error.as_deref(),
            LayoutItem::Dropdown { .. } => None,
        }
    }
}

/// Rendered form: the values it was built from, its fields, and whether any
/// field carries an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsLayout {
    pub values: Settings,
    pub layout: Vec<LayoutItem>,
    pub has_error: bool,
}

impl SettingsLayout {
    /// Error attached to a given setting, if any
    pub fn field_error(&self, setting: &str) -> Option<&str> {
        self.layout
            .iter()
            .find(|item| item.setting() == setting)
            .and_then(LayoutItem::error)
    }
}

/// Render the settings form and validate `values`
pub fn make_layout(values: Settings) -> SettingsLayout {
    let receiver_error = (!values.is_valid()).then(|| INVALID_IP_MESSAGE.to_string());
    let has_error = receiver_error.is_some();

    let layout = vec![
        LayoutItem::Text {
            title: "Device name".to_string(),
            subtitle: Some(DEVICE_NAME_SUBTITLE.to_string()),
            setting: "device_name".to_string(),
            error: None,
        },
        LayoutItem::Dropdown {
            title: "Input".to_string(),
            values: values.input_list.clone(),
            setting: "input".to_string(),
        },
        LayoutItem::Text {
            title: "Receiver IP".to_string(),
            subtitle: Some(RECEIVER_URL_SUBTITLE.to_string()),
            setting: "receiver_url".to_string(),
            error: receiver_error,
        },
    ];

    SettingsLayout {
        values,
        layout,
        has_error,
    }
}
