//! The fixed set of biome categories a banner can be configured for.
//!
//! The registry is static data: every category is known at compile time and
//! the set never changes at runtime. Config entries, sync registration and
//! banner lookups are all driven by iterating [`Biome::ALL`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// One biome category with a configurable arrival banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    Meadows,
    Forest,
    Swamp,
    Mountain,
    Plains,
    Ocean,
    Ashlands,
    DeepNorth,
    Mistlands,
}

impl Biome {
    /// Every category, in registration order.
    pub const ALL: [Biome; 9] = [
        Biome::Meadows,
        Biome::Forest,
        Biome::Swamp,
        Biome::Mountain,
        Biome::Plains,
        Biome::Ocean,
        Biome::Ashlands,
        Biome::DeepNorth,
        Biome::Mistlands,
    ];

    /// Normalized identifier used in config lookups and localization tokens:
    /// lowercase, no punctuation.
    ///
    /// # Examples
    /// ```
    /// use waymark_types::Biome;
    /// assert_eq!(Biome::Meadows.key(), "meadows");
    /// assert_eq!(Biome::DeepNorth.key(), "deepnorth");
    /// ```
    pub const fn key(self) -> &'static str {
        match self {
            Biome::Meadows => "meadows",
            Biome::Forest => "forest",
            Biome::Swamp => "swamp",
            Biome::Mountain => "mountain",
            Biome::Plains => "plains",
            Biome::Ocean => "ocean",
            Biome::Ashlands => "ashlands",
            Biome::DeepNorth => "deepnorth",
            Biome::Mistlands => "mistlands",
        }
    }

    /// Human-readable name, used for entry names in the config file.
    pub const fn display_name(self) -> &'static str {
        match self {
            Biome::Meadows => "Meadows",
            Biome::Forest => "Forest",
            Biome::Swamp => "Swamp",
            Biome::Mountain => "Mountain",
            Biome::Plains => "Plains",
            Biome::Ocean => "Ocean",
            Biome::Ashlands => "Ashlands",
            Biome::DeepNorth => "Deep North",
            Biome::Mistlands => "Mistlands",
        }
    }

    /// Default banner value: a localization token the host resolves itself
    /// when the administrator leaves the entry unchanged.
    ///
    /// # Examples
    /// ```
    /// use waymark_types::Biome;
    /// assert_eq!(Biome::Swamp.localization_token(), "$biome_swamp");
    /// ```
    pub fn localization_token(self) -> String {
        format!("$biome_{}", self.key())
    }

    /// Reverse lookup by normalized key. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Biome> {
        Biome::ALL.into_iter().find(|b| b.key() == key)
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
