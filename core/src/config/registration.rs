//! Startup registration of every configurable entry.
//!
//! One synchronized text entry per [`Biome::ALL`] element plus the global
//! lock flag. The loop is data-driven off the static registry; nothing is
//! registered at runtime beyond this.

use waymark_types::{Biome, Toggle};

use crate::config::store::{ConfigStore, ConfigValue, EntryKey};
use crate::sync::ConfigSync;

/// Section holding general settings.
pub const GENERAL_GROUP: &str = "General";
/// Section holding one banner entry per biome.
pub const BIOME_GROUP: &str = "Biomes";
/// Entry name of the lock flag.
pub const LOCK_ENTRY_NAME: &str = "Lock Configuration";

const TEXT_SUFFIX: &str = " Text";

/// Entry key for a biome's banner text.
pub fn biome_entry_key(biome: Biome) -> EntryKey {
    EntryKey::new(
        BIOME_GROUP,
        format!("{}{}", biome.display_name(), TEXT_SUFFIX),
    )
}

/// Entry key for the global lock flag.
pub fn lock_entry_key() -> EntryKey {
    EntryKey::new(GENERAL_GROUP, LOCK_ENTRY_NAME)
}

/// Bind the lock flag plus one banner entry per biome, registering each
/// with the sync channel.
pub fn bind_biome_entries(store: &mut ConfigStore, sync: &mut ConfigSync) {
    let lock = store.bind(
        GENERAL_GROUP,
        LOCK_ENTRY_NAME,
        ConfigValue::Toggle(Toggle::On),
        "If on, the configuration is locked and can be changed by server admins only.",
        true,
    );
    sync.add_locking_entry(&lock);

    for biome in Biome::ALL {
        let key = store.bind(
            BIOME_GROUP,
            format!("{}{}", biome.display_name(), TEXT_SUFFIX),
            ConfigValue::Text(biome.localization_token()),
            &format!("The message to display when entering the {biome} biome."),
            true,
        );
        sync.add_entry(&key);
    }
}
