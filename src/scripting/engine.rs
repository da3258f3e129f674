//! The Rhai engine behind easel
//!
//! One engine and one shared environment per session. Fragments, command
//! handlers and the init script all run against it:
//! - `E` - the capability surface (name configurable)
//! - `commands` - the command registry
//! - `easel::config::*` - settings and triggers

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use rhai::{AST, Dynamic, Engine, Scope};

use super::api;
use super::api::commands::Commands;
use super::api::surface::Surface;
use super::eval::Outcome;
use super::pending::{InFlight, Pending};
use super::rewrite::{Rewrite, Segment};
use crate::commands::{CommandRegistry, Handler};
use crate::config::{self, Settings, SettingsStore, TriggerStore};
use crate::error::EvalError;
use crate::surface::{Capabilities, PrefixSlot};

/// Variables and function definitions shared by every evaluation. Never
/// cleared for the lifetime of the engine.
pub(super) struct Environment {
    pub scope: Scope<'static>,
    pub library: AST,
}

/// A compiled segment
pub(super) enum Step {
    Script(AST),
    Await { target: Option<String>, ast: AST },
}

impl Step {
    pub fn ast(&self) -> &AST {
        match self {
            Step::Script(ast) | Step::Await { ast, .. } => ast,
        }
    }
}

pub struct ScriptEngine {
    pub(super) engine: Engine,
    pub(super) env: RefCell<Environment>,
    pub(super) registry: Rc<CommandRegistry>,
    pub(super) caps: Rc<dyn Capabilities>,
    pub(super) prefix: Rc<PrefixSlot>,
    pub(super) settings: Rc<SettingsStore>,
    pub(super) surface_param: String,
    pub(super) in_flight: Rc<InFlight>,
}

impl ScriptEngine {
    pub fn new(
        caps: Rc<dyn Capabilities>,
        settings: Rc<SettingsStore>,
        triggers: Rc<TriggerStore>,
    ) -> Self {
        let config = settings.settings();
        let in_flight = Rc::new(InFlight::new());
        let engine = Self::create_engine(
            &config,
            Rc::clone(&caps),
            Rc::clone(&settings),
            Rc::clone(&triggers),
            Rc::clone(&in_flight),
        );

        Self {
            engine,
            env: RefCell::new(Environment {
                scope: Scope::new(),
                library: AST::empty(),
            }),
            registry: Rc::new(CommandRegistry::new(triggers)),
            caps,
            prefix: Rc::new(PrefixSlot::new()),
            settings,
            surface_param: config.surface_param,
            in_flight,
        }
    }

    /// Create the Rhai engine with the `easel` namespace and the script types
    fn create_engine(
        config: &Settings,
        caps: Rc<dyn Capabilities>,
        settings: Rc<SettingsStore>,
        triggers: Rc<TriggerStore>,
        in_flight: Rc<InFlight>,
    ) -> Engine {
        let mut engine = Engine::new();

        // Safety limits
        engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
        engine.set_max_operations(config.max_operations);

        let mut easel_module = rhai::Module::new();
        easel_module.set_sub_module("config", api::config::create_module(settings, triggers));
        engine.register_static_module("easel", easel_module.into());

        api::surface::register(&mut engine, in_flight);
        api::commands::register(&mut engine);

        engine.on_print(move |text| {
            tracing::info!(target: "easel::script", "{text}");
            caps.report(text);
        });
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "easel::script", ?source, %pos, "{text}");
        });

        engine
    }

    pub fn registry(&self) -> &Rc<CommandRegistry> {
        &self.registry
    }

    pub fn prefix(&self) -> &PrefixSlot {
        &self.prefix
    }

    pub fn capabilities(&self) -> &Rc<dyn Capabilities> {
        &self.caps
    }

    /// Current value of a shared variable
    pub fn get(&self, name: &str) -> Option<Dynamic> {
        self.env.borrow().scope.get_value::<Dynamic>(name)
    }

    pub(super) fn surface(&self) -> Surface {
        Surface {
            caps: Rc::clone(&self.caps),
            prefix: Rc::clone(&self.prefix),
            settings: Rc::clone(&self.settings),
        }
    }

    pub(super) fn library(&self) -> AST {
        self.env.borrow().library.clone()
    }

    /// Parse every segment before anything runs
    pub(super) fn compile(&self, rewrite: &Rewrite) -> Result<Vec<Step>, EvalError> {
        if rewrite.nested_await {
            return Err(EvalError::NestedAwait);
        }
        rewrite
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Script(text) => Ok(Step::Script(self.engine.compile(text)?)),
                Segment::Await { target, expr } => Ok(Step::Await {
                    target: target.clone(),
                    ast: self.engine.compile(expr)?,
                }),
            })
            .collect()
    }

    /// Put `E`, `commands` and the fragment's hoisted names in scope, and
    /// add its functions to the shared library.
    pub(super) fn install(&self, bindings: &[String], steps: &[Step]) {
        let mut env = self.env.borrow_mut();
        let Environment { scope, library } = &mut *env;

        scope.set_or_push(self.surface_param.as_str(), self.surface());
        scope.set_or_push(
            "commands",
            Commands {
                registry: Rc::clone(&self.registry),
                caps: Rc::clone(&self.caps),
            },
        );
        for name in bindings {
            if !scope.contains(name) {
                scope.push_dynamic(name.clone(), Dynamic::UNIT);
            }
        }

        for step in steps {
            library.combine(step.ast().clone_functions_only());
        }
    }

    pub(super) fn run_ast(&self, ast: &AST) -> Result<Dynamic, EvalError> {
        let mut env = self.env.borrow_mut();
        let Environment { scope, library } = &mut *env;
        let program = library.merge(ast);
        Ok(self.engine.eval_ast_with_scope::<Dynamic>(scope, &program)?)
    }

    pub(super) fn assign(&self, name: &str, value: Dynamic) {
        self.env.borrow_mut().scope.set_or_push(name, value);
    }

    /// Resolve a `Pending` (and whatever its continuations return) into a
    /// plain value. Anything else is already settled. An operation settled
    /// before gives back its earlier result.
    pub(super) fn settle(&self, value: Dynamic) -> LocalBoxFuture<'_, Result<Dynamic, EvalError>> {
        async move {
            if !value.is::<Pending>() {
                return Ok(value);
            }
            let pending = value.cast::<Pending>();
            let id = pending.id();
            if let Some(result) = self.in_flight.result(id) {
                return Ok(result);
            }
            self.in_flight.claim(id);
            let result = match pending {
                Pending::Op { op, .. } => op.resolve(self.caps.as_ref()).await?,
                Pending::Then { first, next, .. } => {
                    let settled = self.settle(Dynamic::from(*first)).await?;
                    let library = self.library();
                    let value = next.call::<Dynamic>(&self.engine, &library, (settled,))?;
                    self.settle(value).await?
                }
            };
            self.in_flight.finish(id, result.clone());
            Ok(result)
        }
        .boxed_local()
    }

    /// Settle every operation started but never awaited, oldest first. All
    /// of them run; the first failure is returned.
    pub(super) async fn settle_in_flight(&self) -> Result<(), EvalError> {
        let mut first_error = None;
        while let Some(pending) = self.in_flight.take_open() {
            tracing::debug!(%pending, "settling unawaited operation");
            if let Err(e) = self.settle(Dynamic::from(pending)).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Run a registered command with the surface, plus the prefix modifier
    /// for handlers that take two parameters. Operations the handler starts
    /// are settled before this returns.
    pub async fn dispatch(&self, name: &str) -> Result<(), EvalError> {
        let handler = self
            .registry
            .handler(name)
            .ok_or_else(|| EvalError::UnknownCommand(name.to_string()))?;
        tracing::debug!(command = name, prefix = ?self.prefix.get(), "dispatching");

        let result = self.call_handler(handler).await;
        let drained = self.settle_in_flight().await;
        result.and(drained)
    }

    async fn call_handler(&self, handler: Handler) -> Result<(), EvalError> {
        let surface = self.surface();
        let prefix = surface.prefix_value();
        let library = self.library();
        let result = match handler {
            Handler::Native(run) => return run(Rc::clone(&self.caps), self.prefix.get()).await,
            Handler::Repl(repl) => return self.run_repl(&repl).await,
            Handler::Script { name } => {
                let mut scope = Scope::new();
                match arity(&library, &name, 0) {
                    0 => self.engine.call_fn::<Dynamic>(&mut scope, &library, &name, ())?,
                    1 => self.engine.call_fn(&mut scope, &library, &name, (surface,))?,
                    _ => self.engine.call_fn(&mut scope, &library, &name, (surface, prefix))?,
                }
            }
            Handler::Closure(fn_ptr) => {
                match arity(&library, fn_ptr.fn_name(), fn_ptr.curry().len()) {
                    0 => fn_ptr.call::<Dynamic>(&self.engine, &library, ())?,
                    1 => fn_ptr.call(&self.engine, &library, (surface,))?,
                    _ => fn_ptr.call(&self.engine, &library, (surface, prefix))?,
                }
            }
        };
        self.settle(result).await.map(drop)
    }

    /// Load and evaluate a script file
    pub async fn load_file(&self, path: &Path) -> Result<Outcome, EvalError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EvalError::Script {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "loading script");
        Ok(self.evaluate(&content).await)
    }

    /// Load the init script if there is one
    pub async fn load_default(&self) -> Result<Option<Outcome>, EvalError> {
        let path = self
            .settings
            .settings()
            .init_script
            .or_else(config::init_file);
        match path {
            Some(path) if path.exists() => {
                let outcome = self.load_file(&path).await?;
                tracing::info!(commands = self.registry.len(), "init script loaded");
                Ok(Some(outcome))
            }
            _ => Ok(None),
        }
    }
}

/// Parameters a handler takes beyond its curried arguments. Unknown
/// functions are assumed to take just the surface.
fn arity(library: &AST, fn_name: &str, curried: usize) -> usize {
    library
        .iter_functions()
        .filter(|f| f.name == fn_name)
        .map(|f| f.params.len())
        .max()
        .map_or(1, |params| params.saturating_sub(curried))
}
