//! Server-to-client mirroring of synchronized config entries.
//!
//! The authority (server) owns canonical values for the entries registered
//! here; subordinates (clients) receive mirrored copies. Nothing in this
//! module performs I/O — the authority produces payloads, the host
//! transport delivers them, and the subordinate merges them in.

mod payload;
mod version;


pub use payload::{Handshake, SyncPayload, SyncedValue};
pub use version::ProtocolVersion;

use std::collections::HashMap;

use waymark_types::Toggle;

use crate::config::{ConfigStore, ConfigValue, EntryKey};

/// Which side of the session this participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Owns canonical values and pushes them to subordinates.
    Authority,
    /// Receives mirrored values from the authority.
    Subordinate,
}

/// Handle to one registered entry; lets the embedder flip the entry's
/// synchronized flag after registration.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    key: EntryKey,
}

impl SyncHandle {
    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn synchronized(&self, store: &ConfigStore) -> bool {
        store.entry(&self.key).is_some_and(|e| e.synchronized)
    }

    pub fn set_synchronized(&self, store: &mut ConfigStore, synchronized: bool) -> bool {
        store.set_synchronized(&self.key, synchronized)
    }
}

/// The config sync channel for one session participant.
pub struct ConfigSync {
    display_name: String,
    current_version: ProtocolVersion,
    minimum_required: ProtocolVersion,
    role: SyncRole,
    /// Registered entry keys, in registration order.
    entries: Vec<EntryKey>,
    lock_entry: Option<EntryKey>,
    /// Authoritative values last applied on a subordinate; what lock
    /// enforcement re-imposes over local edits.
    mirrored: HashMap<EntryKey, ConfigValue>,
    connection_error: Option<String>,
}

impl ConfigSync {
    pub fn new(
        display_name: impl Into<String>,
        role: SyncRole,
        current_version: ProtocolVersion,
        minimum_required: ProtocolVersion,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            current_version,
            minimum_required,
            role,
            entries: Vec::new(),
            lock_entry: None,
            mirrored: HashMap::new(),
            connection_error: None,
        }
    }

    pub fn role(&self) -> SyncRole {
        self.role
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Register an entry for mirroring. Re-registering is a no-op.
    pub fn add_entry(&mut self, key: &EntryKey) -> SyncHandle {
        if !self.entries.contains(key) {
            self.entries.push(key.clone());
        }
        SyncHandle { key: key.clone() }
    }

    /// Designate the global lock switch. The lock entry is mirrored like
    /// any other registered entry.
    pub fn add_locking_entry(&mut self, key: &EntryKey) -> SyncHandle {
        self.lock_entry = Some(key.clone());
        self.add_entry(key)
    }

    /// This participant's join announcement.
    pub fn handshake(&self) -> Handshake {
        Handshake {
            display_name: self.display_name.clone(),
            current: self.current_version,
            minimum_required: self.minimum_required,
        }
    }

    /// Authority-side join gate: refuse peers older than our minimum
    /// required version. The human-readable message is retained for
    /// display via [`connection_error`](Self::connection_error).
    pub fn accept_peer(&mut self, peer: &Handshake) -> Result<(), SyncError> {
        if peer.current < self.minimum_required {
            let err = SyncError::VersionMismatch {
                peer: peer.current,
                required: self.minimum_required,
            };
            self.connection_error = Some(format!("{}: {err}", self.display_name));
            tracing::info!(
                peer = %peer.display_name,
                version = %peer.current,
                required = %self.minimum_required,
                "refused peer below minimum required version"
            );
            return Err(err);
        }
        self.connection_error = None;
        Ok(())
    }

    /// Subordinate-side retention of a refusal received from the
    /// authority, for the host's connect screen.
    pub fn record_refusal(&mut self, message: impl Into<String>) {
        self.connection_error = Some(message.into());
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    /// Current values of every registered entry whose synchronized flag is
    /// set. Local-only entries are never transmitted.
    pub fn snapshot(&self, store: &ConfigStore) -> SyncPayload {
        let values = self
            .entries
            .iter()
            .filter_map(|key| store.entry(key))
            .filter(|entry| entry.synchronized)
            .map(|entry| SyncedValue {
                group: entry.key.group.clone(),
                name: entry.key.name.clone(),
                value: entry.value().clone(),
            })
            .collect();
        SyncPayload { values }
    }

    /// Subordinate-side merge of an authority payload. Last write wins;
    /// payload keys not registered and bound locally are ignored. Applied
    /// values are remembered as the authoritative mirror. Returns the
    /// number of entries whose value changed.
    pub fn apply(&mut self, store: &mut ConfigStore, payload: &SyncPayload) -> usize {
        let mut changed = 0;
        for synced in &payload.values {
            let key = synced.key();
            if !self.entries.contains(&key) || store.entry(&key).is_none() {
                continue;
            }
            self.mirrored.insert(key.clone(), synced.value.clone());
            if store.set_value(&key, synced.value.clone()) {
                changed += 1;
            }
        }
        changed
    }

    /// Whether authority-pushed values currently override local edits:
    /// only on a subordinate that has received a payload, with the lock
    /// flag on.
    pub fn locked(&self, store: &ConfigStore) -> bool {
        if self.role != SyncRole::Subordinate || self.mirrored.is_empty() {
            return false;
        }
        let Some(lock) = &self.lock_entry else {
            return false;
        };
        store.toggle(lock).is_some_and(Toggle::is_on)
    }

    /// Re-impose the remembered authoritative values over synchronized
    /// entries. Called after a reload on a locked subordinate so local
    /// edits to synchronized entries are overridden; local-only entries
    /// always keep the file's values. Returns the number of entries
    /// restored.
    pub fn enforce_lock(&self, store: &mut ConfigStore) -> usize {
        if !self.locked(store) {
            return 0;
        }
        let mut restored = 0;
        for (key, value) in &self.mirrored {
            if store.set_value(key, value.clone()) {
                restored += 1;
            }
        }
        restored
    }
}

/// Errors from the sync channel.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("client version {peer} is below the minimum required version {required}")]
    VersionMismatch {
        peer: ProtocolVersion,
        required: ProtocolVersion,
    },
    #[error("malformed protocol version {input:?}")]
    MalformedVersion { input: String },
    #[error("undecodable sync payload: {0}")]
    Payload(#[from] serde_json::Error),
}
