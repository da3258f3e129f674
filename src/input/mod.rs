mod handler;
mod keymap;

pub use handler::{KeyOutcome, handle_key};
pub use keymap::{KeySequenceState, Keymap, key_to_string, parse_trigger};
