//! Persisted configuration: settings.json and keybindings.json
//!
//! Both live in `~/.config/easel/` on all platforms, next to the user's
//! `init.rhai`.

mod settings;
mod store;
mod triggers;

use std::path::PathBuf;

pub use settings::{EchoStyle, PickerKind, Settings};
pub use store::SettingsStore;
pub use triggers::{TriggerBinding, TriggerStore};

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config").join("easel"))
}

pub fn settings_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

pub fn keybindings_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("keybindings.json"))
}

/// Get the default init script path
pub fn init_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("init.rhai"))
}
