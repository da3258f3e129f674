use crossterm::event::{KeyCode, KeyModifiers};
use std::time::{Duration, Instant};

use crate::config::TriggerBinding;
use crate::error::KeyParseError;
use crate::surface::PrefixArg;

/// Built-in command that evaluates the selection or current line
pub const EVALUATE_COMMAND: &str = "easel.evaluate";
/// Built-in command that picks a registered command and runs it
pub const EXECUTE_COMMAND: &str = "easel.execute";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl Key {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    #[cfg(test)]
    pub fn char(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    pub fn alt(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::ALT)
    }
}

/// Parse one chord such as `ctrl+x`, `alt+shift+f5` or `space`.
pub fn parse_chord(chord: &str) -> Result<Key, KeyParseError> {
    let parts: Vec<&str> = chord.split('+').collect();
    let Some((name, mods)) = parts.split_last() else {
        return Err(KeyParseError::Empty);
    };

    let mut modifiers = KeyModifiers::NONE;
    for m in mods {
        modifiers |= match m.to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "c" => KeyModifiers::CONTROL,
            "alt" | "meta" | "m" => KeyModifiers::ALT,
            "shift" | "s" => KeyModifiers::SHIFT,
            "cmd" | "super" | "win" => KeyModifiers::SUPER,
            other => return Err(KeyParseError::UnknownModifier(other.to_string())),
        };
    }

    let code = match name.to_ascii_lowercase().as_str() {
        "" => return Err(KeyParseError::Empty),
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "space" => KeyCode::Char(' '),
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        lower => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => match lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    Some(n) if (1..=24).contains(&n) => KeyCode::F(n),
                    _ => return Err(KeyParseError::UnknownKey(name.to_string())),
                },
            }
        }
    };
    Ok(Key::new(code, modifiers))
}

/// Parse a whitespace-separated chord sequence, e.g. `ctrl+x ctrl+e`.
pub fn parse_trigger(trigger: &str) -> Result<Vec<Key>, KeyParseError> {
    let keys = trigger
        .split_whitespace()
        .map(parse_chord)
        .collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(KeyParseError::Empty);
    }
    Ok(keys)
}

/// What a complete key sequence runs
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub command: String,
    pub args: Option<PrefixArg>,
}

/// Trigger table; later bindings of the same sequence win.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: Vec<(Vec<Key>, Binding)>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two front-end operations on their default triggers.
    pub fn with_defaults() -> Self {
        let mut keymap = Self::new();
        keymap.bind(
            vec![Key::ctrl('x'), Key::ctrl('e')],
            Binding {
                command: EVALUATE_COMMAND.to_string(),
                args: None,
            },
        );
        keymap.bind(
            vec![Key::alt('x')],
            Binding {
                command: EXECUTE_COMMAND.to_string(),
                args: None,
            },
        );
        keymap
    }

    pub fn bind(&mut self, keys: Vec<Key>, binding: Binding) {
        self.bindings.retain(|(k, _)| *k != keys);
        self.bindings.push((keys, binding));
    }

    /// Layer persisted bindings on top; unparsable entries are skipped.
    pub fn extend_from(&mut self, entries: &[TriggerBinding]) {
        for entry in entries {
            match parse_trigger(&entry.key) {
                Ok(keys) => self.bind(
                    keys,
                    Binding {
                        command: entry.command.clone(),
                        args: entry.args.as_ref().and_then(PrefixArg::from_json),
                    },
                ),
                Err(e) => tracing::warn!("ignoring trigger `{}`: {e}", entry.key),
            }
        }
    }

    fn lookup(&self, pending: &[Key]) -> MatchResult {
        let mut prefix = false;
        for (keys, binding) in &self.bindings {
            if keys.as_slice() == pending {
                return MatchResult::Complete(binding.clone());
            }
            if keys.len() > pending.len() && keys.starts_with(pending) {
                prefix = true;
            }
        }
        if prefix {
            MatchResult::Prefix
        } else {
            MatchResult::NoMatch
        }
    }
}

pub struct KeySequenceState {
    pending: Vec<Key>,
    last_key_time: Instant,
    timeout: Duration,
    pub count: Option<usize>,
}

impl KeySequenceState {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_millis(1000))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            last_key_time: Instant::now(),
            timeout,
            count: None,
        }
    }

    fn check_timeout(&mut self) {
        if self.last_key_time.elapsed() > self.timeout {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.count = None;
    }

    pub fn process_key(&mut self, key: Key, keymap: &Keymap) -> KeyResult {
        self.check_timeout();
        self.last_key_time = Instant::now();

        if key.code == KeyCode::Esc && key.modifiers == KeyModifiers::NONE {
            let had_state = !self.pending.is_empty() || self.count.is_some();
            self.reset();
            if had_state {
                return KeyResult::Cancelled;
            }
        }

        // Count prefix (digits before any chord, 0 only after another digit)
        if let KeyCode::Char(c) = key.code {
            if self.pending.is_empty() && key.modifiers == KeyModifiers::NONE {
                if let Some(digit) = c.to_digit(10) {
                    if digit != 0 || self.count.is_some() {
                        self.count = Some(self.count.unwrap_or(0) * 10 + digit as usize);
                        return KeyResult::Pending;
                    }
                }
            }
        }

        self.pending.push(key.clone());

        match keymap.lookup(&self.pending) {
            MatchResult::Complete(binding) => self.complete(binding),
            MatchResult::Prefix => KeyResult::Pending,
            MatchResult::NoMatch => {
                // Retry the last key on its own
                if self.pending.len() > 1 {
                    self.pending.clear();
                    self.pending.push(key);
                    match keymap.lookup(&self.pending) {
                        MatchResult::Complete(binding) => self.complete(binding),
                        MatchResult::Prefix => KeyResult::Pending,
                        MatchResult::NoMatch => {
                            self.reset();
                            KeyResult::Unhandled
                        }
                    }
                } else {
                    self.reset();
                    KeyResult::Unhandled
                }
            }
        }
    }

    fn complete(&mut self, binding: Binding) -> KeyResult {
        let count = self.count;
        self.reset();
        KeyResult::Action(binding, count)
    }

    pub fn pending_display(&self) -> String {
        let mut parts = Vec::new();
        if let Some(count) = self.count {
            parts.push(count.to_string());
        }
        parts.extend(self.pending.iter().map(key_to_string));
        parts.join(" ")
    }
}

pub fn key_to_string(key: &Key) -> String {
    let mut s = String::new();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        s.push_str("ctrl+");
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        s.push_str("alt+");
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        s.push_str("shift+");
    }
    if key.modifiers.contains(KeyModifiers::SUPER) {
        s.push_str("cmd+");
    }
    match key.code {
        KeyCode::Char(' ') => s.push_str("space"),
        KeyCode::Char(c) => s.push(c),
        KeyCode::Esc => s.push_str("esc"),
        KeyCode::Enter => s.push_str("enter"),
        KeyCode::Tab => s.push_str("tab"),
        KeyCode::F(n) => s.push_str(&format!("f{n}")),
        KeyCode::Left => s.push_str("left"),
        KeyCode::Right => s.push_str("right"),
        KeyCode::Up => s.push_str("up"),
        KeyCode::Down => s.push_str("down"),
        _ => s.push('?'),
    }
    s
}

impl Default for KeySequenceState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum MatchResult {
    Complete(Binding),
    Prefix,
    NoMatch,
}

#[derive(Debug)]
pub enum KeyResult {
    /// Binding with the typed count, if any
    Action(Binding, Option<usize>),
    Pending,
    Unhandled,
    Cancelled,
}
