//! Line-oriented terminal session over a document.

use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::commands::Handler;
use crate::config::TriggerStore;
use crate::dispatch;
use crate::host::{LineReader, TerminalHost};
use crate::input::{self, KeyOutcome, KeySequenceState, Keymap, key_to_string, parse_trigger};
use crate::scripting::ScriptEngine;
use crate::surface::Capabilities;

/// One line of session input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Fragment(String),
    BeginBlock,
    EndBlock,
    Press(String),
    Run(Option<String>),
    /// 1-based
    Goto(usize),
    Select(usize, usize),
    Buffer,
    Write,
    Quit,
    Invalid(String),
}

pub fn parse_line(line: &str) -> Line {
    let Some(command) = line.trim().strip_prefix(':') else {
        return Line::Fragment(line.to_string());
    };
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();
    let numbers = rest
        .iter()
        .map(|w| w.parse::<usize>().ok().filter(|n| *n > 0))
        .collect::<Option<Vec<_>>>();

    match (name, rest.as_slice(), numbers.as_deref()) {
        ("{", [], _) => Line::BeginBlock,
        ("}", [], _) => Line::EndBlock,
        ("press", [_, ..], _) => Line::Press(rest.join(" ")),
        ("run", [], _) => Line::Run(None),
        ("run", [_, ..], _) => Line::Run(Some(rest.join(" "))),
        ("goto", _, Some([line])) => Line::Goto(*line),
        ("select", _, Some([first, last])) => Line::Select(*first, *last),
        ("buffer", [], _) => Line::Buffer,
        ("write", [], _) => Line::Write,
        ("quit" | "q", [], _) => Line::Quit,
        _ => Line::Invalid(line.trim().to_string()),
    }
}

pub struct Session {
    host: Rc<TerminalHost>,
    engine: ScriptEngine,
    triggers: Rc<TriggerStore>,
    keymap: Keymap,
    keys: KeySequenceState,
    input: Rc<LineReader>,
    block: Option<Vec<String>>,
}

impl Session {
    pub fn new(
        host: Rc<TerminalHost>,
        engine: ScriptEngine,
        triggers: Rc<TriggerStore>,
        input: Rc<LineReader>,
    ) -> Self {
        let mut session = Self {
            host,
            engine,
            triggers,
            keymap: Keymap::with_defaults(),
            keys: KeySequenceState::with_timeout(Duration::from_secs(5)),
            input,
            block: None,
        };
        session.reload_keymap();
        session
    }

    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            // Released before handling; prompts read from the same input
            let line = self.input.lock().await.next_line().await?;
            match line {
                Some(line) => {
                    if !self.handle(&line).await {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Handle one line; `false` ends the session
    pub async fn handle(&mut self, line: &str) -> bool {
        if let Some(block) = self.block.as_mut() {
            if parse_line(line) != Line::EndBlock {
                block.push(line.to_string());
                return true;
            }
            let lines = self.block.take().unwrap_or_default();
            self.evaluate_lines(&lines).await;
            return true;
        }

        match parse_line(line) {
            Line::Fragment(text) if text.trim().is_empty() => {}
            Line::Fragment(text) => self.evaluate_lines(&[text]).await,
            Line::BeginBlock => self.block = Some(Vec::new()),
            Line::EndBlock => self.host.error("`:}` without an open `:{`"),
            Line::Press(keys) => self.press(&keys).await,
            Line::Run(None) => {
                dispatch::execute_registered_command(&self.engine, None).await;
            }
            Line::Run(Some(name)) => {
                dispatch::run_command(&self.engine, &name, None).await;
            }
            Line::Goto(line) => self.host.move_cursor(line - 1, 0),
            Line::Select(first, last) => self
                .host
                .with_document(|doc| doc.select_lines(first - 1, last - 1)),
            Line::Buffer => println!("{}", self.host.with_document(|doc| doc.render())),
            Line::Write => {
                let result = self.host.with_document(|doc| {
                    let dirty = doc.buffer.is_dirty();
                    doc.buffer.save().map(|()| dirty)
                });
                match result {
                    Ok(true) => self.host.report("written"),
                    Ok(false) => self.host.report("no changes"),
                    Err(e) => self.host.error(&format!("write failed: {e}")),
                }
            }
            Line::Quit => return false,
            Line::Invalid(text) => self.host.error(&format!("unknown command `{text}`")),
        }
        true
    }

    /// Append the lines, select them and evaluate them as one fragment
    async fn evaluate_lines(&mut self, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        self.host.with_document(|doc| {
            let first = doc.append_line(&lines[0]);
            let last = lines[1..]
                .iter()
                .fold(first, |_, line| doc.append_line(line));
            if last > first {
                doc.select_lines(first, last);
            }
        });
        let outcome = dispatch::evaluate_selection(&self.engine, None).await;
        tracing::debug!(?outcome, "evaluated");
    }

    async fn press(&mut self, keys: &str) {
        let keys = match parse_trigger(keys) {
            Ok(keys) => keys,
            Err(e) => return self.host.error(&e.to_string()),
        };
        // Scripts may have bound new triggers since the last press
        self.reload_keymap();
        for key in keys {
            let name = key_to_string(&key);
            match input::handle_key(&self.engine, &self.keymap, &mut self.keys, key).await {
                KeyOutcome::Unhandled => self.host.report(&format!("{name} is not bound")),
                KeyOutcome::Cancelled => self.host.report("cancelled"),
                _ => {}
            }
        }
        if !self.keys.pending_display().is_empty() {
            self.host.report(&format!("pending: {}", self.keys.pending_display()));
        }
    }

    fn reload_keymap(&mut self) {
        let mut keymap = Keymap::with_defaults();
        match self.triggers.bindings() {
            Ok(bindings) => keymap.extend_from(&bindings),
            Err(e) => tracing::warn!("could not read keybindings: {e}"),
        }
        self.keymap = keymap;
    }
}

/// Commands the host provides before any script runs
pub fn register_builtins(engine: &ScriptEngine, triggers: Rc<TriggerStore>) {
    let registry = Rc::downgrade(engine.registry());
    engine.registry().register(
        "Show Bindings",
        Handler::native(move |caps: Rc<dyn Capabilities>, _| {
            let (triggers, registry) = (Rc::clone(&triggers), registry.clone());
            async move {
                caps.report("ctrl+x ctrl+e  easel.evaluate");
                caps.report("alt+x  easel.execute");
                for binding in triggers.bindings()? {
                    caps.report(&format!("{}  {}", binding.key, binding.command));
                }
                let Some(registry) = registry.upgrade() else {
                    return Ok(());
                };
                for name in registry.names() {
                    if registry.get(&name).is_some_and(|e| e.trigger.is_none()) {
                        caps.report(&format!("(none)  {name}"));
                    }
                }
                Ok(())
            }
        }),
    );
}
