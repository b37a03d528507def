/*!
 * User Preferences
 * Flat TOML table, re-read on every lookup so external edits apply immediately
 */

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use super::{PreferenceStore, SystemError};

pub struct TomlPreferences {
    path: PathBuf,
}

impl TomlPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Table, SystemError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| SystemError::Preferences(e.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Table::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), SystemError> {
        let mut table = self.load()?;
        table.insert(key.to_string(), Value::Boolean(value));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(&table).map_err(|e| SystemError::Preferences(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PreferenceStore for TomlPreferences {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.load() {
            Ok(table) => table.get(key).and_then(Value::as_bool).unwrap_or(default),
            Err(e) => {
                tracing::warn!("Reading {} failed, using default for {}: {}", self.path.display(), key, e);
                default
            }
        }
    }
}
