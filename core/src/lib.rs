//! Server-configurable biome arrival banners.
//!
//! This crate provides:
//! - **Config store**: TOML-backed entries with defaults and hot reload
//! - **Sync channel**: server-to-client mirroring of synchronized entries
//! - **File watcher**: change notification for the backing file
//! - **Banner hook**: the pre-display substitution observer
//! - **Service loop**: the single-writer task that ties them together
//!
//! The crate is embedded in a host process; it owns no transport, no
//! logging subscriber and no entry point of its own.

pub mod config;
pub mod hook;
pub mod service;
pub mod sync;
pub mod watcher;

// Re-exports for convenience
pub use config::{ConfigEntry, ConfigError, ConfigStore, ConfigValue, EntryKey};
pub use hook::{biome_key_from_token, rewrite_banner};
pub use service::{ServiceCommand, ServiceHandle, SharedState};
pub use sync::{ConfigSync, Handshake, ProtocolVersion, SyncError, SyncPayload, SyncRole};
pub use watcher::{ConfigWatcher, WatchEvent};
