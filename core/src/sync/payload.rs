//! Wire contract between the session authority and its subordinates.
//!
//! Both sides use these exact types for serialization; the host transport
//! only moves opaque bytes.

use serde::{Deserialize, Serialize};

use super::{ProtocolVersion, SyncError};
use crate::config::{ConfigValue, EntryKey};

/// Announcement exchanged when a subordinate joins a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub display_name: String,
    pub current: ProtocolVersion,
    pub minimum_required: ProtocolVersion,
}

/// One synchronized entry's current value, keyed by group plus name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedValue {
    pub group: String,
    pub name: String,
    pub value: ConfigValue,
}

impl SyncedValue {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.group.as_str(), self.name.as_str())
    }
}

/// Full set of synchronized values pushed from the authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub values: Vec<SyncedValue>,
}

impl SyncPayload {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize for the host transport.
    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize bytes received from the host transport.
    pub fn decode(bytes: &[u8]) -> Result<SyncPayload, SyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
