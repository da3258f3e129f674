use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use rhai::FnPtr;

use crate::config::TriggerStore;
use crate::error::{EvalError, RegistryError};
use crate::input::parse_trigger;
use crate::scripting::Repl;
use crate::surface::{Capabilities, PrefixArg};

/// Host-provided command body
pub type NativeHandler =
    Rc<dyn Fn(Rc<dyn Capabilities>, Option<PrefixArg>) -> LocalBoxFuture<'static, Result<(), EvalError>>>;

#[derive(Clone)]
pub enum Handler {
    /// A named function in the shared script library
    Script { name: String },
    /// A closure or function pointer value
    Closure(FnPtr),
    /// Sends the selection to a running interpreter
    Repl(Repl),
    Native(NativeHandler),
}

impl Handler {
    pub fn native<F, Fut>(run: F) -> Self
    where
        F: Fn(Rc<dyn Capabilities>, Option<PrefixArg>) -> Fut + 'static,
        Fut: Future<Output = Result<(), EvalError>> + 'static,
    {
        Handler::Native(Rc::new(
            move |caps: Rc<dyn Capabilities>, prefix: Option<PrefixArg>| {
                run(caps, prefix).boxed_local()
            },
        ))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Script { name } => f.debug_struct("Script").field("name", name).finish(),
            Handler::Closure(fn_ptr) => f.debug_tuple("Closure").field(fn_ptr).finish(),
            Handler::Repl(repl) => f.debug_tuple("Repl").field(repl).finish(),
            Handler::Native(_) => f.write_str("Native"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub handler: Handler,
    pub trigger: Option<String>,
}

/// Named commands, in registration order. Re-registering a name replaces its
/// handler in place.
pub struct CommandRegistry {
    entries: RefCell<IndexMap<String, CommandEntry>>,
    triggers: Rc<TriggerStore>,
}

impl CommandRegistry {
    pub fn new(triggers: Rc<TriggerStore>) -> Self {
        Self {
            entries: RefCell::new(IndexMap::new()),
            triggers,
        }
    }

    pub fn register(&self, name: &str, handler: Handler) {
        self.insert(name, handler, None);
    }

    /// Register and persist a trigger for the command. Exactly one trigger
    /// is accepted; anything else is refused and nothing is registered.
    pub fn register_with_trigger(
        &self,
        name: &str,
        triggers: Vec<String>,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let [trigger] = <[String; 1]>::try_from(triggers).map_err(|rest| {
            RegistryError::TriggerCount {
                name: name.to_string(),
                count: rest.len(),
            }
        })?;
        parse_trigger(&trigger).map_err(|source| RegistryError::InvalidTrigger {
            trigger: trigger.clone(),
            source,
        })?;

        self.triggers.bind(&trigger, name)?;
        tracing::info!(command = name, %trigger, "bound trigger");
        self.insert(name, handler, Some(trigger));
        Ok(())
    }

    fn insert(&self, name: &str, handler: Handler, trigger: Option<String>) {
        let mut entries = self.entries.borrow_mut();
        // Keep a trigger registered earlier unless a new one is given
        let trigger = trigger.or_else(|| entries.get(name).and_then(|e| e.trigger.clone()));
        entries.insert(
            name.to_string(),
            CommandEntry {
                handler,
                trigger,
            },
        );
        tracing::debug!(command = name, "registered");
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.entries.borrow().get(name).map(|e| e.handler.clone())
    }

    pub fn get(&self, name: &str) -> Option<CommandEntry> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (CommandRegistry, Rc<TriggerStore>) {
        let triggers = Rc::new(TriggerStore::in_memory());
        (CommandRegistry::new(Rc::clone(&triggers)), triggers)
    }

    fn script(name: &str) -> Handler {
        Handler::Script {
            name: name.to_string(),
        }
    }

    #[test]
    fn last_registration_wins_in_place() {
        let (registry, _) = registry();
        registry.register("Greet", script("greet"));
        registry.register("Other", script("other"));
        registry.register("Greet", script("greet2"));

        assert_eq!(registry.names(), vec!["Greet", "Other"]);
        assert!(matches!(
            registry.handler("Greet"),
            Some(Handler::Script { name }) if name == "greet2"
        ));
    }

    #[test]
    fn single_trigger_is_persisted() {
        let (registry, triggers) = registry();
        registry
            .register_with_trigger("Greet", vec!["ctrl+x g".to_string()], script("greet"))
            .unwrap();

        assert_eq!(
            registry.get("Greet").and_then(|e| e.trigger),
            Some("ctrl+x g".to_string())
        );
        let bindings = triggers.bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].command, "Greet");
    }

    #[test]
    fn trigger_count_other_than_one_is_refused() {
        let (registry, triggers) = registry();
        let err = registry
            .register_with_trigger(
                "Greet",
                vec!["ctrl+x g".to_string(), "ctrl+x h".to_string()],
                script("greet"),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::TriggerCount { count: 2, .. }));

        let err = registry
            .register_with_trigger("Greet", Vec::new(), script("greet"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::TriggerCount { count: 0, .. }));

        assert!(!registry.contains("Greet"));
        assert!(triggers.bindings().unwrap().is_empty());
    }

    #[test]
    fn unparsable_trigger_is_refused() {
        let (registry, _) = registry();
        let err = registry
            .register_with_trigger("Greet", vec!["hyper+q".to_string()], script("greet"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTrigger { .. }));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn plain_reregistration_keeps_trigger() {
        let (registry, _) = registry();
        registry
            .register_with_trigger("Greet", vec!["alt+g".to_string()], script("greet"))
            .unwrap();
        registry.register("Greet", script("greet"));
        assert_eq!(
            registry.get("Greet").and_then(|e| e.trigger),
            Some("alt+g".to_string())
        );
    }
}
