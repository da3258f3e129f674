use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::JsonStore;
use crate::error::StoreError;

/// One entry of keybindings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerBinding {
    pub key: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// keybindings.json: an array of trigger → command associations.
#[derive(Debug)]
pub struct TriggerStore {
    store: JsonStore,
}

impl TriggerStore {
    pub fn open(path: PathBuf) -> Self {
        Self {
            store: JsonStore::open(path, Value::Array(Vec::new())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            store: JsonStore::in_memory(Value::Array(Vec::new())),
        }
    }

    pub fn bindings(&self) -> Result<Vec<TriggerBinding>, StoreError> {
        Ok(serde_json::from_value(self.store.read()?)?)
    }

    /// Persist `key → command`, replacing any binding of the same key.
    pub fn bind(&self, key: &str, command: &str) -> Result<(), StoreError> {
        let binding = serde_json::to_value(TriggerBinding {
            key: key.to_string(),
            command: command.to_string(),
            args: None,
        })?;
        self.store.update(|doc| {
            if !doc.is_array() {
                *doc = Value::Array(Vec::new());
            }
            if let Some(entries) = doc.as_array_mut() {
                entries.retain(|entry| entry.get("key").and_then(Value::as_str) != Some(key));
                entries.push(binding);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_appends_entries() {
        let triggers = TriggerStore::in_memory();
        triggers.bind("ctrl+x g", "Greet").unwrap();
        triggers.bind("ctrl+x h", "Help").unwrap();
        let keys: Vec<_> = triggers
            .bindings()
            .unwrap()
            .into_iter()
            .map(|b| (b.key, b.command))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ctrl+x g".to_string(), "Greet".to_string()),
                ("ctrl+x h".to_string(), "Help".to_string()),
            ]
        );
    }

    #[test]
    fn rebinding_a_key_replaces_it() {
        let triggers = TriggerStore::in_memory();
        triggers.bind("ctrl+x g", "Greet").unwrap();
        triggers.bind("ctrl+x g", "Goodbye").unwrap();
        let bindings = triggers.bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].command, "Goodbye");
    }

    #[test]
    fn args_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keybindings.json");
        std::fs::write(
            &path,
            r#"[{ "key": "ctrl+u ctrl+x ctrl+e", "command": "easel.evaluate", "args": true }]"#,
        )
        .unwrap();
        let triggers = TriggerStore::open(path);
        triggers.bind("alt+x", "easel.execute").unwrap();

        let bindings = triggers.bindings().unwrap();
        assert_eq!(bindings[0].args, Some(Value::Bool(true)));
        assert_eq!(bindings[1].args, None);
    }
}
