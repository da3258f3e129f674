use crate::dispatch::{self, Dispatched};
use crate::scripting::{Outcome, ScriptEngine};
use crate::surface::PrefixArg;

use super::keymap::{EVALUATE_COMMAND, EXECUTE_COMMAND, Key, KeyResult, KeySequenceState, Keymap};

/// What a key press led to
#[derive(Debug, PartialEq)]
pub enum KeyOutcome {
    /// Waiting for more keys of a sequence
    Pending(String),
    Evaluated(Outcome),
    Dispatched(Dispatched),
    Cancelled,
    Unhandled,
}

pub async fn handle_key(
    engine: &ScriptEngine,
    keymap: &Keymap,
    state: &mut KeySequenceState,
    key: Key,
) -> KeyOutcome {
    match state.process_key(key, keymap) {
        KeyResult::Pending => KeyOutcome::Pending(state.pending_display()),
        KeyResult::Cancelled => KeyOutcome::Cancelled,
        KeyResult::Unhandled => KeyOutcome::Unhandled,
        KeyResult::Action(binding, count) => {
            // A typed count overrides the binding's own args
            let modifier = count.map(|n| PrefixArg::Count(n as i64)).or(binding.args);
            tracing::debug!(command = %binding.command, ?modifier, "trigger");
            match binding.command.as_str() {
                EVALUATE_COMMAND => {
                    KeyOutcome::Evaluated(dispatch::evaluate_selection(engine, modifier).await)
                }
                EXECUTE_COMMAND => KeyOutcome::Dispatched(
                    dispatch::execute_registered_command(engine, modifier).await,
                ),
                name => KeyOutcome::Dispatched(dispatch::run_command(engine, name, modifier).await),
            }
        }
    }
}
