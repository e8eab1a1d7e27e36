//! User preferences and the key-value contract used to persist them.
//!
//! Durable storage belongs to the embedding application. The core only needs a
//! store that can get and set strings; settings live as one JSON document under
//! [`SETTINGS_KEY`].

use crate::error::Result;
use crate::pitch::Algorithm;
use crate::tuning::TuningStandard;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key under which [`Settings`] are stored.
pub const SETTINGS_KEY: &str = "appSettings";

/// Minimal string key-value store.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub algorithm: Algorithm,
    pub tuning: TuningStandard,
}

impl Settings {
    /// Reads settings from `store`, falling back to defaults when the entry is
    /// missing or unreadable.
    pub fn load(store: &impl SettingsStore) -> Self {
        let Some(raw) = store.get(SETTINGS_KEY) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable stored settings: {e}");
            Self::default()
        })
    }

    pub fn save(&self, store: &mut impl SettingsStore) -> Result<()> {
        let json = serde_json::to_string(self)?;
        store.set(SETTINGS_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_gives_defaults() {
        let store = MemoryStore::new();
        let settings = Settings::load(&store);
        assert_eq!(settings.algorithm, Algorithm::Yin);
        assert_eq!(settings.tuning, TuningStandard::A440);
    }

    #[test]
    fn save_then_load() {
        let mut store = MemoryStore::new();
        let settings = Settings {
            algorithm: Algorithm::Mpm,
            tuning: TuningStandard::A432,
        };
        settings.save(&mut store).unwrap();
        assert_eq!(
            store.get(SETTINGS_KEY).as_deref(),
            Some(r#"{"algorithm":"MPM","tuning":"432"}"#)
        );
        assert_eq!(Settings::load(&store), settings);
    }

    #[test]
    fn stored_ui_fields_are_ignored() {
        let mut store = MemoryStore::new();
        store
            .set(SETTINGS_KEY, r#"{"theme":"dark","algorithm":"MPM","tuning":"415"}"#)
            .unwrap();
        let settings = Settings::load(&store);
        assert_eq!(settings.algorithm, Algorithm::Mpm);
        assert_eq!(settings.tuning, TuningStandard::A415);
    }

    #[test]
    fn corrupt_entry_gives_defaults() {
        let mut store = MemoryStore::new();
        store.set(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn unusable_stored_tuning_gives_defaults() {
        let mut store = MemoryStore::new();
        store
            .set(SETTINGS_KEY, r#"{"algorithm":"MPM","tuning":"0"}"#)
            .unwrap();
        assert_eq!(Settings::load(&store).tuning, TuningStandard::A440);
    }
}
