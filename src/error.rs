use std::io;
use std::path::PathBuf;

use rhai::{EvalAltResult, ParseError};
use thiserror::Error;

/// Failure while evaluating a fragment or dispatching a command.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Runtime(#[from] Box<EvalAltResult>),

    #[error("`await` is only supported as a top-level statement")]
    NestedAwait,

    #[error("no command named `{0}`")]
    UnknownCommand(String),

    #[error("subprocess `{command}` failed: {source}")]
    Subprocess {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Refused command registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("command `{name}` was given {count} triggers; exactly one is allowed")]
    TriggerCount { name: String, count: usize },

    #[error("invalid trigger `{trigger}`: {source}")]
    InvalidTrigger {
        trigger: String,
        #[source]
        source: KeyParseError,
    },

    #[error("command `{0}` must be bound to a function")]
    NotCallable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reading or writing a persisted JSON document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed config document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key sequence")]
    Empty,

    #[error("unknown key `{0}`")]
    UnknownKey(String),

    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
}
