use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::LFError;
use crate::places::PlaceSet;

pub const PLACES_KEY: &str = "locationFilterCities";
pub const ENABLED_KEY: &str = "locationFilterEnabled";

/// Key value storage for the two persisted preferences. Both calls may fail;
/// callers treat persistence as best effort.
pub trait PreferenceStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, LFError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), LFError>;
}

/// Stores all keys in one json object on disk. The file is re-read on every
/// access so the last writer wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, LFError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(LFError::LoadingFailed(format!(
                "{} does not hold a json object",
                self.path.display()
            ))),
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, LFError> {
        Ok(self.read_all()?.remove(key).unwrap_or(default))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), LFError> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(all))?)?;
        debug!("Stored {key} in {}", self.path.display());
        Ok(())
    }
}

/// Keeps preferences for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
    #[cfg(test)]
    fail_reads: bool,
    #[cfg(test)]
    fail_writes: bool,
}

#[cfg(test)]
impl MemoryStore {
    /// A store whose reads and/or writes always fail.
    pub fn failing(reads: bool, writes: bool) -> Self {
        Self {
            fail_reads: reads,
            fail_writes: writes,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, LFError> {
        #[cfg(test)]
        if self.fail_reads {
            return Err(LFError::LoadingFailed(format!("reading {key} failed")));
        }
        Ok(self.values.get(key).cloned().unwrap_or(default))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), LFError> {
        #[cfg(test)]
        if self.fail_writes {
            return Err(LFError::LoadingFailed(format!("writing {key} failed")));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

// ---------------------- Typed access with fallbacks ----------------------- //

/// A missing, malformed or empty list yields the default set.
pub fn load_places(store: &dyn PreferenceStore) -> PlaceSet {
    match store.get(PLACES_KEY, Value::Null) {
        Ok(Value::Array(values)) => {
            let names: Option<Vec<&str>> = values.iter().map(Value::as_str).collect();
            match names {
                Some(names) if !names.is_empty() => PlaceSet::from_values(names),
                _ => {
                    debug!("Ignoring malformed place list {values:?}");
                    PlaceSet::default()
                }
            }
        }
        Ok(Value::Null) => PlaceSet::default(),
        Ok(other) => {
            debug!("Ignoring malformed place list {other:?}");
            PlaceSet::default()
        }
        Err(e) => {
            warn!("Failed to load places from storage: {e}");
            PlaceSet::default()
        }
    }
}

pub fn save_places(store: &mut dyn PreferenceStore, places: &PlaceSet) {
    if let Err(e) = store.set(PLACES_KEY, Value::from(places.to_vec())) {
        warn!("Failed to save places to storage: {e}");
    }
}

pub fn load_enabled(store: &dyn PreferenceStore) -> bool {
    match store.get(ENABLED_KEY, Value::Bool(false)) {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(e) => {
            warn!("Failed to load filter state from storage: {e}");
            false
        }
    }
}

pub fn save_enabled(store: &mut dyn PreferenceStore, enabled: bool) {
    if let Err(e) = store.set(ENABLED_KEY, Value::Bool(enabled)) {
        warn!("Failed to save filter state to storage: {e}");
    }
}
