//! Pre-display banner substitution.
//!
//! The host's notification pipeline invokes [`rewrite_banner`] just before
//! an arrival banner is shown, handing over the text by mutable reference.
//! The hook is a pure function of its inputs plus the store snapshot; it
//! never mutates the store.

use waymark_types::Biome;

use crate::config::{ConfigStore, biome_entry_key};

/// Normalize a raw banner token into a registry key: strip the `$biome_`
/// prefix, drop remaining underscores, lowercase.
///
/// No validation happens here beyond the registry lookup done by the
/// caller — a malformed token simply normalizes to an unknown key, which
/// is a defined no-op.
pub fn biome_key_from_token(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix("$biome_").unwrap_or(trimmed);
    stripped
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Replace an arrival banner with the configured message, when there is
/// one.
///
/// `genuine_arrival` is false for teleport-style notifications; those pass
/// through untouched, as does any text whose token does not resolve to a
/// registered biome. Returns whether the text was substituted.
pub fn rewrite_banner(store: &ConfigStore, text: &mut String, genuine_arrival: bool) -> bool {
    if !genuine_arrival {
        return false;
    }

    let key = biome_key_from_token(text);
    let Some(biome) = Biome::from_key(&key) else {
        return false;
    };

    match store.text(&biome_entry_key(biome)) {
        Some(message) => {
            *text = message.to_string();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValue, bind_biome_entries};
    use crate::sync::{ConfigSync, ProtocolVersion, SyncRole};

    fn test_store() -> ConfigStore {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join("waymark.toml")).unwrap();
        let mut sync = ConfigSync::new(
            "Waymark",
            SyncRole::Authority,
            ProtocolVersion::new(1, 0, 0),
            ProtocolVersion::new(1, 0, 0),
        );
        bind_biome_entries(&mut store, &mut sync);
        store
    }

    #[test]
    fn normalization_strips_prefix_and_underscores() {
        assert_eq!(biome_key_from_token("$biome_meadows"), "meadows");
        assert_eq!(biome_key_from_token("$biome_deep_north"), "deepnorth");
        assert_eq!(biome_key_from_token(" $biome_Meadows "), "meadows");
        assert_eq!(biome_key_from_token("plains"), "plains");
        assert_eq!(biome_key_from_token(""), "");
    }

    #[test]
    fn known_token_is_substituted() {
        let mut store = test_store();
        store.set_value(
            &biome_entry_key(Biome::Meadows),
            ConfigValue::text("Welcome home."),
        );

        let mut text = String::from("$biome_meadows");
        assert!(rewrite_banner(&store, &mut text, true));
        assert_eq!(text, "Welcome home.");
    }

    #[test]
    fn unknown_token_passes_through() {
        let store = test_store();
        let mut text = String::from("$biome_volcano");
        assert!(!rewrite_banner(&store, &mut text, true));
        assert_eq!(text, "$biome_volcano");
    }

    #[test]
    fn suppressed_arrival_never_substitutes() {
        let mut store = test_store();
        store.set_value(
            &biome_entry_key(Biome::Meadows),
            ConfigValue::text("Welcome home."),
        );

        let mut text = String::from("$biome_meadows");
        assert!(!rewrite_banner(&store, &mut text, false));
        assert_eq!(text, "$biome_meadows");
    }

    #[test]
    fn default_token_substitutes_to_itself_until_configured() {
        let store = test_store();
        let mut text = String::from("$biome_swamp");
        assert!(rewrite_banner(&store, &mut text, true));
        assert_eq!(text, "$biome_swamp");
    }

    #[test]
    fn underscored_variant_resolves_to_the_same_entry() {
        let mut store = test_store();
        store.set_value(
            &biome_entry_key(Biome::DeepNorth),
            ConfigValue::text("Mind the cold."),
        );

        let mut text = String::from("$biome_deep_north");
        assert!(rewrite_banner(&store, &mut text, true));
        assert_eq!(text, "Mind the cold.");
    }
}
