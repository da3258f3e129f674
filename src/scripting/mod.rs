//! Scripting - fragment rewriting and the Rhai runtime
//!
//! Fragments see three things besides their own variables:
//! - `E` - the capability surface (editor, messages, subprocesses, prompts,
//!   interpreters)
//! - `commands` - the command registry
//! - `easel::config::*` - settings and triggers

mod api;
mod engine;
mod eval;
mod lexer;
mod pending;
mod repl;
mod rewrite;
mod value;

pub use engine::ScriptEngine;
pub use eval::Outcome;
pub use repl::Repl;
