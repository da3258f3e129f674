use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How evaluation results are shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EchoStyle {
    /// Information message annotated with the value's type
    #[default]
    Notification,
    /// Inline `⮕ value` marker
    Overlay,
    /// Status-line style `[type] value`
    Status,
}

impl EchoStyle {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "notification" => Some(EchoStyle::Notification),
            "overlay" => Some(EchoStyle::Overlay),
            "status" => Some(EchoStyle::Status),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EchoStyle::Notification => "notification",
            EchoStyle::Overlay => "overlay",
            EchoStyle::Status => "status",
        }
    }
}

/// Which picker presents command names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PickerKind {
    Fzf,
    #[default]
    Prompt,
}

/// Settings read from the `"easel"` section of settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub echo_style: EchoStyle,

    /// Parameter name that marks a function as a command handler
    pub surface_param: String,

    pub picker: PickerKind,

    /// Overrides ~/.config/easel/init.rhai
    pub init_script: Option<PathBuf>,

    // Script limits
    pub max_operations: u64,
    pub max_expr_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            echo_style: EchoStyle::default(),
            surface_param: "E".to_string(),
            picker: PickerKind::default(),
            init_script: None,

            max_operations: 100_000,
            max_expr_depth: 64,
        }
    }
}
