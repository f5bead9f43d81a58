//! Protocol version used by the join handshake.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SyncError;

/// Dotted numeric version (`"1.0.0"`) with ordered comparison.
///
/// Serialized as the dotted string on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProtocolVersion {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SyncError::MalformedVersion {
            input: s.to_string(),
        };
        let mut parts = s.trim().split('.');
        let next = |parts: &mut std::str::Split<'_, char>| {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(malformed)
        };
        let major = next(&mut parts)?;
        let minor = next(&mut parts)?;
        let patch = next(&mut parts)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(ProtocolVersion::new(major, minor, patch))
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = SyncError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProtocolVersion> for String {
    fn from(v: ProtocolVersion) -> String {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_numerals() {
        let v: ProtocolVersion = "1.0.0".parse().unwrap();
        assert_eq!(v, ProtocolVersion::new(1, 0, 0));
        assert_eq!(v.to_string(), "1.0.0");
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "1", "1.0", "1.0.x", "1.0.0.0", "a.b.c"] {
            assert!(input.parse::<ProtocolVersion>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn orders_lexicographically() {
        let old: ProtocolVersion = "0.9.0".parse().unwrap();
        let new: ProtocolVersion = "1.0.0".parse().unwrap();
        assert!(old < new);
        assert!("1.0.1".parse::<ProtocolVersion>().unwrap() > new);
        assert!("1.10.0".parse::<ProtocolVersion>().unwrap() > "1.9.0".parse().unwrap());
    }
}
