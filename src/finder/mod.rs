mod fzf;

pub use fzf::{PickResult, fzf_available, pick, resolve_answer};
