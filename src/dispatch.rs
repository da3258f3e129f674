//! Front-end operations bound to triggers. Each one sets the prefix modifier
//! for exactly its own duration.

use crate::scripting::{Outcome, ScriptEngine};
use crate::surface::PrefixArg;

/// Result of running a registered command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Ran(String),
    /// Picker dismissed, or nothing to pick from
    Cancelled,
    /// Already reported on the error channel
    Failed { name: String, message: String },
}

/// Evaluate the selection, or the current line when nothing is selected
pub async fn evaluate_selection(engine: &ScriptEngine, modifier: Option<PrefixArg>) -> Outcome {
    let _guard = engine.prefix().scoped(modifier);
    let fragment = engine.capabilities().selection_or_current_line();
    engine.evaluate(&fragment).await
}

/// Pick a registered command by name and run it
pub async fn execute_registered_command(
    engine: &ScriptEngine,
    modifier: Option<PrefixArg>,
) -> Dispatched {
    let _guard = engine.prefix().scoped(modifier);
    let names = engine.registry().names();
    if names.is_empty() {
        engine.capabilities().report("no commands registered");
        return Dispatched::Cancelled;
    }
    match engine.capabilities().prompt_choice("Command", &names).await {
        Some(name) => run(engine, name).await,
        None => Dispatched::Cancelled,
    }
}

/// Run one command by name
pub async fn run_command(
    engine: &ScriptEngine,
    name: &str,
    modifier: Option<PrefixArg>,
) -> Dispatched {
    let _guard = engine.prefix().scoped(modifier);
    run(engine, name.to_string()).await
}

async fn run(engine: &ScriptEngine, name: String) -> Dispatched {
    match engine.dispatch(&name).await {
        Ok(()) => Dispatched::Ran(name),
        Err(e) => {
            let message = e.to_string();
            tracing::error!(command = %name, "command failed: {message}");
            engine.capabilities().error(&message);
            Dispatched::Failed { name, message }
        }
    }
}
