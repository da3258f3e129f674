//! `E` - the capability surface as seen from scripts
//!
//! Usage in Rhai:
//! ```rhai
//! let line = E.selection();
//! E.echo(line.len());
//! let out = await E.run("git status --short");
//! await E.choose("Pick one", ["a", "b"]).then(|c| E.report(c));
//! E.overlay(6 * 7);
//! ```

use std::fmt;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, INT, Map};

use crate::config::{EchoStyle, SettingsStore};
use crate::scripting::pending::{InFlight, Operation, Pending, labels};
use crate::scripting::repl::{Repl, ReplOptions};
use crate::scripting::value::{display, from_json, kind_of, to_json};
use crate::surface::{Capabilities, PrefixArg, PrefixSlot};

#[derive(Clone)]
pub struct Surface {
    pub caps: Rc<dyn Capabilities>,
    pub prefix: Rc<PrefixSlot>,
    pub settings: Rc<SettingsStore>,
}

impl Surface {
    /// Current prefix modifier; `()` when none is set
    pub fn prefix_value(&self) -> Dynamic {
        match self.prefix.get() {
            Some(PrefixArg::Flag(flag)) => Dynamic::from(flag),
            Some(PrefixArg::Count(n)) => Dynamic::from(n as INT),
            None => Dynamic::UNIT,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<surface>")
    }
}

fn position(n: INT) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn echo_styled(s: &mut Surface, style: EchoStyle, value: Dynamic) {
    s.caps.echo_as(style, &display(&value), Some(&kind_of(&value)));
}

/// Register `Surface`, `Pending` and `Repl` with their methods. Host
/// operations are tracked in `in_flight` from the moment they start.
pub fn register(engine: &mut Engine, in_flight: Rc<InFlight>) {
    engine.register_type_with_name::<Surface>("Surface");
    engine.register_type_with_name::<Pending>("Pending");
    engine.register_type_with_name::<Repl>("Repl");
    engine.register_fn("to_string", |s: &mut Surface| s.to_string());
    engine.register_fn("to_debug", |s: &mut Surface| s.to_string());
    engine.register_fn("to_string", |p: &mut Pending| p.to_string());
    engine.register_fn("to_debug", |p: &mut Pending| p.to_string());
    engine.register_fn("to_string", |r: &mut Repl| r.to_string());
    engine.register_fn("to_debug", |r: &mut Repl| r.to_string());

    // Editor
    engine.register_fn("selection", |s: &mut Surface| s.caps.selection_or_current_line());
    engine.register_fn("insert", |s: &mut Surface, value: Dynamic| {
        s.caps.insert_text(&display(&value));
    });
    engine.register_fn("replace", |s: &mut Surface, value: Dynamic| {
        s.caps.replace_selection(&display(&value));
    });
    engine.register_fn("goto", |s: &mut Surface, line: INT, col: INT| {
        s.caps.move_cursor(position(line), position(col));
    });
    engine.register_fn("goto", |s: &mut Surface, line: INT| {
        s.caps.move_cursor(position(line), 0);
    });

    // Messages
    engine.register_fn("echo", |s: &mut Surface, value: Dynamic| {
        s.caps.echo(&display(&value), Some(&kind_of(&value)));
    });
    engine.register_fn("report", |s: &mut Surface, value: Dynamic| {
        s.caps.report(&display(&value));
    });
    engine.register_fn("error", |s: &mut Surface, value: Dynamic| {
        s.caps.error(&display(&value));
    });
    engine.register_fn("overlay", |s: &mut Surface, value: Dynamic| {
        echo_styled(s, EchoStyle::Overlay, value);
    });
    engine.register_fn("status", |s: &mut Surface, value: Dynamic| {
        echo_styled(s, EchoStyle::Status, value);
    });
    engine.register_fn("notify", |s: &mut Surface, value: Dynamic| {
        echo_styled(s, EchoStyle::Notification, value);
    });

    // Host operations; settled at `await`, or when the evaluation ends
    let started = Rc::clone(&in_flight);
    engine.register_fn("run", move |_: &mut Surface, command: &str| {
        started.start(Operation::Subprocess(command.to_string()))
    });
    let started = Rc::clone(&in_flight);
    engine.register_fn("choose", move |_: &mut Surface, prompt: &str, choices: Array| {
        started.start(Operation::Choice {
            prompt: prompt.to_string(),
            choices: labels(choices),
        })
    });
    let started = Rc::clone(&in_flight);
    engine.register_fn("sleep", move |_: &mut Surface, ms: INT| {
        started.start(Operation::Sleep(u64::try_from(ms).unwrap_or(0)))
    });
    engine.register_fn("then", move |p: &mut Pending, next: FnPtr| {
        in_flight.chain(p.clone(), next)
    });

    // Interpreters
    engine.register_fn(
        "repl",
        |_: &mut Surface, options: Map| -> Result<Repl, Box<EvalAltResult>> {
            Ok(Repl::new(ReplOptions::from_map(&options)?))
        },
    );

    engine.register_get("prefix", |s: &mut Surface| s.prefix_value());

    // User keys in settings.json
    engine.register_fn(
        "setting",
        |s: &mut Surface, key: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let value = s.settings.get(key).map_err(|e| e.to_string())?;
            Ok(value.as_ref().map_or(Dynamic::UNIT, from_json))
        },
    );
    engine.register_fn(
        "set_setting",
        |s: &mut Surface, key: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            s.settings
                .set(key, to_json(&value))
                .map_err(|e| e.to_string().into())
        },
    );
}

#[cfg(test)]
mod tests {
    use rhai::Scope;

    use super::*;
    use crate::surface::testing::{Event, RecordingSurface};

    fn setup() -> (Engine, Scope<'static>, Rc<RecordingSurface>, Surface) {
        let (engine, scope, recording, surface, _) = setup_tracked();
        (engine, scope, recording, surface)
    }

    fn setup_tracked() -> (
        Engine,
        Scope<'static>,
        Rc<RecordingSurface>,
        Surface,
        Rc<InFlight>,
    ) {
        let mut engine = Engine::new();
        let in_flight = Rc::new(InFlight::new());
        register(&mut engine, Rc::clone(&in_flight));
        let recording = Rc::new(RecordingSurface::with_selection("1 + 1"));
        let surface = Surface {
            caps: recording.clone(),
            prefix: Rc::new(PrefixSlot::new()),
            settings: Rc::new(SettingsStore::in_memory()),
        };
        let mut scope = Scope::new();
        scope.push("E", surface.clone());
        (engine, scope, recording, surface, in_flight)
    }

    #[test]
    fn editor_methods_reach_the_surface() {
        let (engine, mut scope, recording, _) = setup();
        engine
            .run_with_scope(
                &mut scope,
                r#"
                let s = E.selection();
                E.insert(s + "!");
                E.goto(3, 1);
                E.echo(42);
                "#,
            )
            .unwrap();
        assert_eq!(
            recording.events(),
            vec![
                Event::Insert("1 + 1!".to_string()),
                Event::Goto(3, 1),
                Event::Echo("42".to_string(), Some("number".to_string())),
            ]
        );
    }

    #[test]
    fn host_operations_are_tracked_until_settled() {
        let (engine, mut scope, recording, _, in_flight) = setup_tracked();
        let value: Dynamic = engine
            .eval_with_scope(&mut scope, r#"E.run("ls").then(|out| out.stdout)"#)
            .unwrap();
        let pending = value.cast::<Pending>();
        assert!(recording.events().is_empty());
        assert_eq!(in_flight.take_open().map(|p| p.id()), Some(pending.id()));
        assert!(in_flight.take_open().is_none());
    }

    #[test]
    fn styled_echoes_ignore_the_configured_style() {
        let (engine, mut scope, recording, _) = setup();
        engine
            .run_with_scope(&mut scope, r#"E.overlay(42); E.status("ok");"#)
            .unwrap();
        assert_eq!(
            recording.events(),
            vec![
                Event::EchoAs(EchoStyle::Overlay, "42".to_string()),
                Event::EchoAs(EchoStyle::Status, "ok".to_string()),
            ]
        );
    }

    #[test]
    fn host_values_print_readably() {
        let (engine, mut scope, _, _) = setup();
        let shown: String = engine
            .eval_with_scope(&mut scope, r#"`${E} ${E.sleep(5)} ${E.run("ls").then(|o| o)}`"#)
            .unwrap();
        assert_eq!(shown, r#"<surface> <pending sleep 5ms> <pending run "ls" then ..>"#);
    }

    #[test]
    fn repl_options_are_checked_when_created() {
        let (engine, mut scope, _, _) = setup();
        let repl: Dynamic = engine
            .eval_with_scope(&mut scope, r#"E.repl(#{ command: "python3 -i", prompt: ">>> " })"#)
            .unwrap();
        assert_eq!(display(&repl), "<repl python3 -i>");
        let err = engine
            .eval_with_scope::<Dynamic>(&mut scope, r#"E.repl(#{ prompt: ">>> " })"#)
            .unwrap_err();
        assert!(err.to_string().contains("command"));
    }

    #[test]
    fn prefix_reads_the_slot() {
        let (engine, mut scope, _, surface) = setup();
        let unset: Dynamic = engine.eval_with_scope(&mut scope, "E.prefix").unwrap();
        assert!(unset.is_unit());

        let _guard = surface.prefix.scoped(Some(PrefixArg::Count(4)));
        let count: INT = engine.eval_with_scope(&mut scope, "E.prefix").unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn settings_round_trip() {
        let (engine, mut scope, _, surface) = setup();
        engine
            .run_with_scope(&mut scope, r#"E.set_setting("python", #{ path: "/usr/bin/python3" })"#)
            .unwrap();
        assert_eq!(
            surface.settings.get("python").unwrap(),
            Some(serde_json::json!({ "path": "/usr/bin/python3" }))
        );
        let path: String = engine
            .eval_with_scope(&mut scope, r#"E.setting("python").path"#)
            .unwrap();
        assert_eq!(path, "/usr/bin/python3");
    }
}
