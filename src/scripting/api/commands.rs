//! `commands` - the command registry as seen from scripts
//!
//! Usage in Rhai:
//! ```rhai
//! commands["Greet"] = Fn("greet");
//! commands["Shout"] = |E| E.echo(E.selection().to_upper());
//! commands["Build"] = #{ "ctrl+x b": |E| E.run("cargo build") };
//! commands.register("Test", ["ctrl+x t"], Fn("test"));
//! commands["JShell"] = E.repl(#{ command: "jshell", prompt: "jshell>" });
//! ```

use std::fmt;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, FnPtr, ImmutableString, Map};

use crate::commands::{CommandRegistry, Handler};
use crate::error::RegistryError;
use crate::scripting::repl::Repl;
use crate::scripting::value::display;
use crate::surface::Capabilities;

#[derive(Clone)]
pub struct Commands {
    pub registry: Rc<CommandRegistry>,
    pub caps: Rc<dyn Capabilities>,
}

impl fmt::Display for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<commands: {}>", self.registry.len())
    }
}

impl Commands {
    /// `commands[name] = value`; a single-entry map binds a trigger
    fn assign(&self, name: &str, value: Dynamic) -> Result<(), RegistryError> {
        if value.is::<Map>() {
            let map = value.cast::<Map>();
            let triggers: Vec<String> = map.keys().map(|k| k.to_string()).collect();
            let Some(value) = map.into_values().next() else {
                return Err(RegistryError::TriggerCount {
                    name: name.to_string(),
                    count: 0,
                });
            };
            let handler = handler_from(name, value)?;
            return self.registry.register_with_trigger(name, triggers, handler);
        }
        self.registry.register(name, handler_from(name, value)?);
        Ok(())
    }

    fn register_triggered(
        &self,
        name: &str,
        triggers: Array,
        value: Dynamic,
    ) -> Result<(), RegistryError> {
        let triggers = triggers.iter().map(display).collect();
        let handler = handler_from(name, value)?;
        self.registry.register_with_trigger(name, triggers, handler)
    }

    /// Registration errors are reported, never thrown
    fn refuse(&self, name: &str, err: RegistryError) {
        tracing::warn!(command = name, "refused registration: {err}");
        self.caps.error(&err.to_string());
    }
}

/// A function pointer, closure, function name or REPL
fn handler_from(name: &str, value: Dynamic) -> Result<Handler, RegistryError> {
    if value.is::<Repl>() {
        return Ok(Handler::Repl(value.cast::<Repl>()));
    }
    if value.is::<FnPtr>() {
        let fn_ptr = value.cast::<FnPtr>();
        if fn_ptr.is_anonymous() || !fn_ptr.curry().is_empty() {
            return Ok(Handler::Closure(fn_ptr));
        }
        return Ok(Handler::Script {
            name: fn_ptr.fn_name().to_string(),
        });
    }
    if let Some(fn_name) = value.read_lock::<ImmutableString>() {
        return Ok(Handler::Script {
            name: fn_name.to_string(),
        });
    }
    Err(RegistryError::NotCallable(name.to_string()))
}

fn handler_value(handler: Handler) -> Dynamic {
    match handler {
        Handler::Script { name } => FnPtr::new(name).map_or(Dynamic::UNIT, Dynamic::from),
        Handler::Closure(fn_ptr) => Dynamic::from(fn_ptr),
        Handler::Repl(repl) => Dynamic::from(repl),
        Handler::Native(_) => Dynamic::UNIT,
    }
}

pub fn register(engine: &mut Engine) {
    engine.register_type_with_name::<Commands>("Commands");
    engine.register_fn("to_string", |c: &mut Commands| c.to_string());
    engine.register_fn("to_debug", |c: &mut Commands| c.to_string());

    engine.register_indexer_set(|c: &mut Commands, name: ImmutableString, value: Dynamic| {
        if let Err(err) = c.assign(&name, value) {
            c.refuse(&name, err);
        }
    });
    engine.register_indexer_get(|c: &mut Commands, name: ImmutableString| {
        c.registry.handler(&name).map_or(Dynamic::UNIT, handler_value)
    });

    engine.register_fn("register", |c: &mut Commands, name: &str, value: Dynamic| {
        if let Err(err) = c.assign(name, value) {
            c.refuse(name, err);
        }
    });
    engine.register_fn(
        "register",
        |c: &mut Commands, name: &str, triggers: Array, value: Dynamic| {
            if let Err(err) = c.register_triggered(name, triggers, value) {
                c.refuse(name, err);
            }
        },
    );
    engine.register_fn("list", |c: &mut Commands| -> Array {
        c.registry.names().into_iter().map(Dynamic::from).collect()
    });
    engine.register_fn("contains", |c: &mut Commands, name: &str| c.registry.contains(name));
}
