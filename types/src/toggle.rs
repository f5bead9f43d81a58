//! On/off switch used for boolean config entries.

use serde::{Deserialize, Serialize};

/// A boolean config value that reads as `"on"`/`"off"` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    On,
    #[default]
    Off,
}

impl Toggle {
    pub const fn is_on(self) -> bool {
        matches!(self, Toggle::On)
    }

    pub const fn from_bool(on: bool) -> Self {
        if on { Toggle::On } else { Toggle::Off }
    }

    /// Accepts the serialized forms plus plain booleans (`"true"`/`"false"`)
    /// so hand-edited files are forgiving to read.
    pub fn parse(s: &str) -> Option<Toggle> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" => Some(Toggle::On),
            "off" | "false" => Some(Toggle::Off),
            _ => None,
        }
    }
}
