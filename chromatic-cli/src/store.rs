//! Settings persisted as a small JSON file next to the binary's working directory.

use chromatic_core::error::{Error, Result};
use chromatic_core::settings::SettingsStore;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "tuner_settings.json";

/// A key-value store backed by one JSON object on disk.
///
/// The whole file is rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty if it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), "ignoring settings file: {e}");
                }
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut file = File::create(&self.path).map_err(|e| store_error(&self.path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| store_error(&self.path, e))
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

fn read_entries(path: &Path) -> std::io::Result<BTreeMap<String, String>> {
    let mut file = File::open(path)?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    serde_json::from_str(&data).map_err(std::io::Error::other)
}

fn store_error(path: &Path, e: std::io::Error) -> Error {
    Error::Store(format!("{}: {e}", path.display()))
}
