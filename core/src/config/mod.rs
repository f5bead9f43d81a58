//! Configuration storage for banner entries.
//!
//! This module provides:
//! - **Store**: TOML-backed key/value entries with bind-time defaults
//! - **Registration**: the startup loop that binds one entry per biome
//!
//! The backing file is human-edited; `reload` re-reads it in place and a
//! parse failure leaves the previous values untouched.

mod registration;
mod store;


pub use registration::{
    BIOME_GROUP, GENERAL_GROUP, LOCK_ENTRY_NAME, bind_biome_entries, biome_entry_key,
    lock_entry_key,
};
pub use store::{
    ConfigEntry, ConfigError, ConfigStore, ConfigValue, EntryKey, default_config_path,
};
