//! The capability surface: editor and OS operations the evaluation engine
//! consumes but does not implement.

use std::cell::Cell;
use std::io;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EchoStyle;

/// Captured output of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<i32>,
}

/// Editor/OS facade handed to fragments (as `E`) and to command handlers.
#[async_trait(?Send)]
pub trait Capabilities {
    /// Selected text, or the whole current line when nothing is selected.
    /// Leaves the cursor at the end of the captured region.
    fn selection_or_current_line(&self) -> String;

    fn replace_selection(&self, text: &str);

    fn insert_text(&self, text: &str);

    fn move_cursor(&self, line: usize, col: usize);

    /// Surface a value to the user; `kind` is its runtime type name.
    fn echo(&self, text: &str, kind: Option<&str>);

    /// Echo in a given style instead of the configured one.
    fn echo_as(&self, style: EchoStyle, text: &str, kind: Option<&str>);

    /// Diagnostic/log channel.
    fn report(&self, message: &str);

    /// Error-report channel.
    fn error(&self, message: &str);

    async fn run_subprocess(&self, command: &str) -> io::Result<ProcessOutput>;

    /// `None` when the user cancels.
    async fn prompt_choice(&self, prompt: &str, choices: &[String]) -> Option<String>;
}

/// Value of the prefix modifier supplied by a trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrefixArg {
    Flag(bool),
    Count(i64),
}

impl PrefixArg {
    /// Whether the modifier asks for the alternate behaviour.
    pub fn is_truthy(&self) -> bool {
        match self {
            PrefixArg::Flag(flag) => *flag,
            PrefixArg::Count(n) => *n != 0,
        }
    }

    /// Read the `args` of a persisted trigger binding.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(PrefixArg::Flag(*flag)),
            Value::Number(n) => n.as_i64().map(PrefixArg::Count),
            _ => None,
        }
    }
}

/// Ambient prefix modifier, set for the duration of one dispatch.
#[derive(Debug, Default)]
pub struct PrefixSlot {
    value: Cell<Option<PrefixArg>>,
}

impl PrefixSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<PrefixArg> {
        self.value.get()
    }

    /// Set the modifier until the returned guard drops.
    pub fn scoped(&self, arg: Option<PrefixArg>) -> PrefixGuard<'_> {
        self.value.set(arg);
        PrefixGuard { slot: self }
    }
}

/// Clears the prefix modifier on drop, whatever way the dispatch ended.
#[must_use = "the prefix modifier is cleared as soon as the guard drops"]
pub struct PrefixGuard<'a> {
    slot: &'a PrefixSlot,
}

impl Drop for PrefixGuard<'_> {
    fn drop(&mut self) {
        self.slot.value.set(None);
    }
}
