//! TOML-backed configuration store.
//!
//! Entries are bound once at startup with a default value and description.
//! A value persisted in the backing file wins over the bind-time default,
//! so administrator edits survive restarts. `reload` updates every bound
//! entry in place; `save` writes the whole store back out with the entry
//! descriptions as comment lines.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use waymark_types::Toggle;

/// Identity of an entry in the backing file: section plus entry name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub group: String,
    pub name: String,
}

impl EntryKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// A live configuration value. The store is string-oriented; the lock flag
/// is the one toggle-typed entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigValue {
    Text(String),
    Toggle(Toggle),
}

impl ConfigValue {
    pub fn text(s: impl Into<String>) -> Self {
        ConfigValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            ConfigValue::Toggle(_) => None,
        }
    }

    pub fn as_toggle(&self) -> Option<Toggle> {
        match self {
            ConfigValue::Toggle(t) => Some(*t),
            ConfigValue::Text(_) => None,
        }
    }

    /// Parse a raw TOML value using `self` as the type witness (the bound
    /// default decides whether the entry reads as text or as a toggle).
    /// A raw value of the wrong shape reads as absent.
    fn parse_raw(&self, raw: &toml::Value) -> Option<ConfigValue> {
        match self {
            ConfigValue::Text(_) => raw.as_str().map(ConfigValue::text),
            ConfigValue::Toggle(_) => match raw {
                toml::Value::Boolean(b) => Some(ConfigValue::Toggle(Toggle::from_bool(*b))),
                toml::Value::String(s) => Toggle::parse(s).map(ConfigValue::Toggle),
                _ => None,
            },
        }
    }

    fn render_toml(&self) -> String {
        match self {
            ConfigValue::Text(s) => toml_quote(s),
            ConfigValue::Toggle(Toggle::On) => toml_quote("on"),
            ConfigValue::Toggle(Toggle::Off) => toml_quote("off"),
        }
    }
}

/// One bound entry: identity, default, live value.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub key: EntryKey,
    pub default: ConfigValue,
    pub description: String,
    pub synchronized: bool,
    value: ConfigValue,
}

impl ConfigEntry {
    pub fn value(&self) -> &ConfigValue {
        &self.value
    }
}

/// Mapping from entry key to live value, backed by one TOML file.
///
/// Every bound entry always has a defined value: the persisted one if the
/// file had it, the default otherwise. Keys are never inserted from outside
/// `bind` — unknown keys in the file or in sync payloads are ignored.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    entries: HashMap<EntryKey, ConfigEntry>,
    /// Keys in bind order, for stable save output.
    order: Vec<EntryKey>,
    /// Raw table from the last read, consulted at bind time so entries
    /// registered after `open` still pick up persisted values.
    persisted: toml::Table,
}

impl ConfigStore {
    /// Open a store over `path`. A missing file is an empty store, not an
    /// error; an unreadable or malformed file is surfaced to the caller.
    pub fn open(path: impl Into<PathBuf>) -> Result<ConfigStore, ConfigError> {
        let path = path.into();
        let persisted = read_table(&path)?;
        Ok(ConfigStore {
            path,
            entries: HashMap::new(),
            order: Vec::new(),
            persisted,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register an entry. Idempotent per key; the persisted value wins over
    /// the default. The stored description notes whether the entry is
    /// synced with the server.
    pub fn bind(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        default: ConfigValue,
        description: &str,
        synchronized: bool,
    ) -> EntryKey {
        let key = EntryKey::new(group, name);
        if self.entries.contains_key(&key) {
            return key;
        }

        let suffix = if synchronized {
            " [Synced with Server]"
        } else {
            " [Not Synced with Server]"
        };
        let value = lookup(&self.persisted, &key)
            .and_then(|raw| default.parse_raw(raw))
            .unwrap_or_else(|| default.clone());

        self.order.push(key.clone());
        self.entries.insert(
            key.clone(),
            ConfigEntry {
                key: key.clone(),
                default,
                description: format!("{description}{suffix}"),
                synchronized,
                value,
            },
        );
        key
    }

    // --- Accessors ---

    pub fn entry(&self, key: &EntryKey) -> Option<&ConfigEntry> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &EntryKey) -> Option<&ConfigValue> {
        self.entries.get(key).map(ConfigEntry::value)
    }

    pub fn text(&self, key: &EntryKey) -> Option<&str> {
        self.value(key).and_then(ConfigValue::as_text)
    }

    pub fn toggle(&self, key: &EntryKey) -> Option<Toggle> {
        self.value(key).and_then(ConfigValue::as_toggle)
    }

    /// Bound entries in bind order.
    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // --- Mutation ---

    /// Set a bound entry's live value. Returns whether the value changed;
    /// unbound keys are ignored (never inserted).
    pub fn set_value(&mut self, key: &EntryKey, value: ConfigValue) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.value != value => {
                entry.value = value;
                true
            }
            _ => false,
        }
    }

    /// Flip an entry's synchronized flag. Returns false for unbound keys.
    pub fn set_synchronized(&mut self, key: &EntryKey, synchronized: bool) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.synchronized = synchronized;
                true
            }
            None => false,
        }
    }

    /// Re-read the backing file, updating all bound entries in place.
    ///
    /// On failure the in-memory values are untouched — the error is
    /// returned before anything is mutated. Bound keys missing from the
    /// file (or present with the wrong shape) fall back to their defaults;
    /// unknown keys in the file are ignored.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let table = read_table(&self.path)?;
        for entry in self.entries.values_mut() {
            entry.value = lookup(&table, &entry.key)
                .and_then(|raw| entry.default.parse_raw(raw))
                .unwrap_or_else(|| entry.default.clone());
        }
        self.persisted = table;
        Ok(())
    }

    /// Write every bound entry back to the backing file, grouped by
    /// section with descriptions as comment lines. Creates parent
    /// directories as needed. `save` followed by `reload` is
    /// value-identical.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: self.path.clone(),
                source: e,
            })?;
        }

        let mut groups: Vec<&str> = Vec::new();
        for key in &self.order {
            if !groups.contains(&key.group.as_str()) {
                groups.push(&key.group);
            }
        }

        let mut out = String::new();
        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section_header(group)));
            for key in self.order.iter().filter(|k| k.group == *group) {
                let Some(entry) = self.entries.get(key) else {
                    continue;
                };
                for line in entry.description.lines() {
                    out.push_str("# ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push_str(&format!(
                    "{} = {}\n",
                    toml_quote(&key.name),
                    entry.value.render_toml()
                ));
            }
        }

        fs::write(&self.path, out).map_err(|e| ConfigError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Default per-user config location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("waymark").join("waymark.toml"))
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    if !path.exists() {
        return Ok(toml::Table::new());
    }
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn lookup<'a>(table: &'a toml::Table, key: &EntryKey) -> Option<&'a toml::Value> {
    table.get(&key.group)?.as_table()?.get(&key.name)
}

/// Render a TOML basic string, escaping as needed.
fn toml_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Section headers stay bare when TOML allows it, quoted otherwise.
fn section_header(group: &str) -> String {
    let bare = !group.is_empty()
        && group
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        group.to_string()
    } else {
        toml_quote(group)
    }
}

/// Errors from the config layer.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to watch {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
