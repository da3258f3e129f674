use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde_json::{Map, Value};

use super::Settings;
use crate::error::StoreError;

/// A JSON document that is read, modified and written back wholesale on
/// every mutation. There is no locking: concurrent external edits are lost.
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    memory: RefCell<Value>,
    empty: Value,
}

impl JsonStore {
    /// Back the store with a file; a missing file reads as `empty`.
    pub fn open(path: PathBuf, empty: Value) -> Self {
        Self {
            path: Some(path),
            memory: RefCell::new(empty.clone()),
            empty,
        }
    }

    pub fn in_memory(initial: Value) -> Self {
        Self {
            path: None,
            empty: initial.clone(),
            memory: RefCell::new(initial),
        }
    }

    pub fn read(&self) -> Result<Value, StoreError> {
        let Some(path) = &self.path else {
            return Ok(self.memory.borrow().clone());
        };
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(self.empty.clone()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(self.empty.clone()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write the whole document.
    pub fn update<R>(&self, edit: impl FnOnce(&mut Value) -> R) -> Result<R, StoreError> {
        let mut doc = self.read()?;
        let result = edit(&mut doc);
        self.write(&doc)?;
        Ok(result)
    }

    fn write(&self, doc: &Value) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            *self.memory.borrow_mut() = doc.clone();
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(doc)?)?;
        Ok(())
    }
}

/// settings.json: typed settings under `"easel"`, free-form user keys beside it.
#[derive(Debug)]
pub struct SettingsStore {
    store: JsonStore,
}

impl SettingsStore {
    const SECTION: &'static str = "easel";

    pub fn open(path: PathBuf) -> Self {
        Self {
            store: JsonStore::open(path, Value::Object(Map::new())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            store: JsonStore::in_memory(Value::Object(Map::new())),
        }
    }

    /// Typed settings; unreadable documents fall back to defaults.
    pub fn settings(&self) -> Settings {
        let section = match self.store.read() {
            Ok(doc) => doc.get(Self::SECTION).cloned(),
            Err(e) => {
                tracing::warn!("settings unreadable, using defaults: {e}");
                None
            }
        };
        match section {
            Some(section) => serde_json::from_value(section).unwrap_or_else(|e| {
                tracing::warn!("invalid `{}` settings, using defaults: {e}", Self::SECTION);
                Settings::default()
            }),
            None => Settings::default(),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let section = serde_json::to_value(settings)?;
        self.set(Self::SECTION, section)
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.store.read()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.store.update(|doc| {
            if !doc.is_object() {
                *doc = Value::Object(Map::new());
            }
            if let Some(map) = doc.as_object_mut() {
                map.insert(key.to_string(), value);
            }
        })
    }
}
