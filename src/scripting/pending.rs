//! Asynchronous host operations as script values.
//!
//! `E.run(..)`, `E.choose(..)` and `E.sleep(..)` return a `Pending` instead of
//! blocking the engine. The evaluator settles it at an `await` statement, when
//! a command handler returns one, or when the evaluation or dispatch that
//! started it finishes. A started operation always runs exactly once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use rhai::{Array, Dynamic, FnPtr, INT, Map};

use crate::error::EvalError;
use crate::surface::{Capabilities, ProcessOutput};

/// Settled results kept for operations that are awaited again
const SETTLED_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum Operation {
    Subprocess(String),
    Choice { prompt: String, choices: Vec<String> },
    Sleep(u64),
}

#[derive(Debug, Clone)]
pub enum Pending {
    Op { id: u64, op: Operation },
    /// Feed the settled value of `first` to `next`
    Then {
        id: u64,
        first: Box<Pending>,
        next: FnPtr,
    },
}

impl Pending {
    pub fn id(&self) -> u64 {
        match self {
            Pending::Op { id, .. } | Pending::Then { id, .. } => *id,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Subprocess(command) => write!(f, "run {command:?}"),
            Operation::Choice { prompt, .. } => write!(f, "choose {prompt:?}"),
            Operation::Sleep(ms) => write!(f, "sleep {ms}ms"),
        }
    }
}

impl fmt::Display for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn chain(pending: &Pending, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match pending {
                Pending::Op { op, .. } => write!(f, "{op}"),
                Pending::Then { first, .. } => {
                    chain(first, f)?;
                    f.write_str(" then ..")
                }
            }
        }
        f.write_str("<pending ")?;
        chain(self, f)?;
        f.write_str(">")
    }
}

/// Operations started by scripts and not yet settled, in start order, plus
/// recently settled results.
#[derive(Debug, Default)]
pub struct InFlight {
    next_id: Cell<u64>,
    open: RefCell<IndexMap<u64, Pending>>,
    settled: RefCell<IndexMap<u64, Dynamic>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn start(&self, op: Operation) -> Pending {
        let pending = Pending::Op {
            id: self.next_id(),
            op,
        };
        self.open.borrow_mut().insert(pending.id(), pending.clone());
        pending
    }

    /// `first.then(next)`: the chain replaces `first` as the open operation
    pub fn chain(&self, first: Pending, next: FnPtr) -> Pending {
        self.claim(first.id());
        let pending = Pending::Then {
            id: self.next_id(),
            first: Box::new(first),
            next,
        };
        self.open.borrow_mut().insert(pending.id(), pending.clone());
        pending
    }

    /// Mark an operation as being settled by its owner
    pub fn claim(&self, id: u64) {
        self.open.borrow_mut().shift_remove(&id);
    }

    /// Oldest operation nobody has settled yet
    pub fn take_open(&self) -> Option<Pending> {
        self.open.borrow_mut().shift_remove_index(0).map(|(_, p)| p)
    }

    pub fn result(&self, id: u64) -> Option<Dynamic> {
        self.settled.borrow().get(&id).cloned()
    }

    pub fn finish(&self, id: u64, value: Dynamic) {
        let mut settled = self.settled.borrow_mut();
        settled.insert(id, value);
        if settled.len() > SETTLED_CAPACITY {
            settled.shift_remove_index(0);
        }
    }
}

impl Operation {
    pub async fn resolve(self, caps: &dyn Capabilities) -> Result<Dynamic, EvalError> {
        match self {
            Operation::Subprocess(command) => {
                tracing::debug!(%command, "running subprocess");
                let output = caps
                    .run_subprocess(&command)
                    .await
                    .map_err(|source| EvalError::Subprocess { command, source })?;
                Ok(Dynamic::from_map(output_map(output)))
            }
            Operation::Choice { prompt, choices } => {
                let choice = caps.prompt_choice(&prompt, &choices).await;
                Ok(choice.map_or(Dynamic::UNIT, Dynamic::from))
            }
            Operation::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(Dynamic::UNIT)
            }
        }
    }
}

/// `#{ stdout, stderr, status }`; status is `()` when killed by a signal
fn output_map(output: ProcessOutput) -> Map {
    let mut map = Map::new();
    map.insert("stdout".into(), Dynamic::from(output.stdout));
    map.insert("stderr".into(), Dynamic::from(output.stderr));
    map.insert(
        "status".into(),
        output
            .status
            .map_or(Dynamic::UNIT, |code| Dynamic::from(code as INT)),
    );
    map
}

/// Choice labels from a script array
pub fn labels(choices: Array) -> Vec<String> {
    choices.iter().map(super::value::display).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::testing::{Event, RecordingSurface};

    #[test]
    fn chaining_replaces_the_open_operation() {
        let in_flight = InFlight::new();
        let run = in_flight.start(Operation::Subprocess("ls".to_string()));
        let sleep = in_flight.start(Operation::Sleep(5));
        let chained = in_flight.chain(run, FnPtr::new("print").unwrap());

        assert_eq!(in_flight.take_open().map(|p| p.id()), Some(sleep.id()));
        assert_eq!(in_flight.take_open().map(|p| p.id()), Some(chained.id()));
        assert!(in_flight.take_open().is_none());
    }

    #[test]
    fn settled_results_are_bounded() {
        let in_flight = InFlight::new();
        for id in 0..=SETTLED_CAPACITY as u64 {
            in_flight.finish(id, Dynamic::from(id as INT));
        }
        assert!(in_flight.result(0).is_none());
        assert_eq!(
            in_flight.result(SETTLED_CAPACITY as u64).and_then(|v| v.as_int().ok()),
            Some(SETTLED_CAPACITY as INT)
        );
    }

    #[test]
    fn pending_values_describe_themselves() {
        let in_flight = InFlight::new();
        let run = in_flight.start(Operation::Subprocess("ls".to_string()));
        assert_eq!(run.to_string(), r#"<pending run "ls">"#);
        let chained = in_flight.chain(run, FnPtr::new("print").unwrap());
        assert_eq!(chained.to_string(), r#"<pending run "ls" then ..>"#);
        let sleep = in_flight.start(Operation::Sleep(20));
        assert_eq!(sleep.to_string(), "<pending sleep 20ms>");
    }

    #[tokio::test]
    async fn subprocess_resolves_to_output_map() {
        let surface = RecordingSurface::default();
        let value = Operation::Subprocess("ls".to_string())
            .resolve(&surface)
            .await
            .unwrap();
        let map = value.cast::<Map>();
        assert_eq!(map["stdout"].to_string(), "ran ls");
        assert_eq!(map["status"].as_int(), Ok(0));
        assert_eq!(surface.events(), vec![Event::Subprocess("ls".to_string())]);
    }

    #[tokio::test]
    async fn cancelled_choice_is_unit() {
        let surface = RecordingSurface::default();
        surface.answer(None);
        let value = Operation::Choice {
            prompt: "pick".to_string(),
            choices: vec!["a".to_string()],
        }
        .resolve(&surface)
        .await
        .unwrap();
        assert!(value.is_unit());
    }

    #[tokio::test]
    async fn chosen_label_is_returned() {
        let surface = RecordingSurface::default();
        surface.answer(Some("b"));
        let value = Operation::Choice {
            prompt: "pick".to_string(),
            choices: labels(vec![Dynamic::from("a".to_string()), Dynamic::from("b".to_string())]),
        }
        .resolve(&surface)
        .await
        .unwrap();
        assert_eq!(value.to_string(), "b");
    }
}
