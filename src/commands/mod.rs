//! Named, user-invocable commands

mod registry;

pub use registry::{CommandRegistry, Handler};
