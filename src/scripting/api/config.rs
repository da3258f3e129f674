//! easel::config - settings.json and keybindings.json
//!
//! Usage in Rhai:
//! ```rhai
//! easel::config::set_echo_style("overlay");
//! easel::config::set("python", #{ path: "/usr/bin/python3" });
//! easel::config::bind("ctrl+x g", "Greet");
//! ```

use rhai::plugin::*;
use std::rc::Rc;

use crate::config::{EchoStyle, SettingsStore, TriggerStore};
use crate::input::parse_trigger;
use crate::scripting::value::{from_json, to_json};

/// Create the config module over the persisted stores
pub fn create_module(settings: Rc<SettingsStore>, triggers: Rc<TriggerStore>) -> rhai::Module {
    let mut module = rhai::Module::new();

    // get(key) -> value or ()
    {
        let s = Rc::clone(&settings);
        module.set_native_fn(
            "get",
            move |key: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                let value = s.get(key).map_err(|e| e.to_string())?;
                Ok(value.as_ref().map_or(Dynamic::UNIT, from_json))
            },
        );
    }

    // set(key, value)
    {
        let s = Rc::clone(&settings);
        module.set_native_fn(
            "set",
            move |key: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
                s.set(key, to_json(&value)).map_err(|e| e.to_string().into())
            },
        );
    }

    // echo_style() -> String
    {
        let s = Rc::clone(&settings);
        module.set_native_fn(
            "echo_style",
            move || -> Result<String, Box<EvalAltResult>> {
                Ok(s.settings().echo_style.name().to_string())
            },
        );
    }

    // set_echo_style(name: &str)
    {
        let s = Rc::clone(&settings);
        module.set_native_fn(
            "set_echo_style",
            move |name: &str| -> Result<(), Box<EvalAltResult>> {
                let Some(style) = EchoStyle::parse(name) else {
                    return Err(format!("unknown echo style `{name}`").into());
                };
                let mut settings = s.settings();
                settings.echo_style = style;
                s.save(&settings).map_err(|e| e.to_string().into())
            },
        );
    }

    // bind(trigger: &str, command: &str)
    {
        let t = Rc::clone(&triggers);
        module.set_native_fn(
            "bind",
            move |trigger: &str, command: &str| -> Result<(), Box<EvalAltResult>> {
                parse_trigger(trigger)
                    .map_err(|e| format!("invalid trigger `{trigger}`: {e}"))?;
                t.bind(trigger, command).map_err(|e| e.to_string().into())
            },
        );
    }

    // bindings() -> Array of #{ key, command, args }
    {
        let t = Rc::clone(&triggers);
        module.set_native_fn(
            "bindings",
            move || -> Result<rhai::Array, Box<EvalAltResult>> {
                let bindings = t.bindings().map_err(|e| e.to_string())?;
                Ok(bindings
                    .into_iter()
                    .map(|b| {
                        let mut map = rhai::Map::new();
                        map.insert("key".into(), Dynamic::from(b.key));
                        map.insert("command".into(), Dynamic::from(b.command));
                        map.insert(
                            "args".into(),
                            b.args.as_ref().map_or(Dynamic::UNIT, from_json),
                        );
                        Dynamic::from_map(map)
                    })
                    .collect())
            },
        );
    }

    module
}
