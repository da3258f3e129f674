//! Evaluating a fragment and deciding what the user sees.

use rhai::Dynamic;

use super::ScriptEngine;
use super::engine::Step;
use super::lexer::is_identifier;
use super::rewrite::{Rewrite, rewrite};
use super::value::{display, is_silent, kind_of};
use crate::commands::Handler;
use crate::error::EvalError;

/// How an evaluation was surfaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Leading function without the surface parameter; nothing shown
    Defined(String),
    /// Leading function exposed as a command; its name was echoed
    Registered(String),
    /// Prefix modifier was set: the value went into the document
    Inserted(String),
    Echoed { text: String, kind: String },
    Silent,
    /// Already reported on the error channel
    Failed(String),
}

impl ScriptEngine {
    /// Rewrite, run and surface one fragment. Failures are reported to the
    /// user and logged, never returned.
    pub async fn evaluate(&self, fragment: &str) -> Outcome {
        let rewrite = rewrite(fragment);
        tracing::debug!(
            text = %rewrite.text(),
            segments = rewrite.segments.len(),
            bindings = ?rewrite.bindings,
            suspends = rewrite.suspends,
            "rewrote fragment"
        );

        let result = self.execute(&rewrite).await;
        let drained = self.settle_in_flight().await;
        self.reset_temporaries(&rewrite.temporaries);

        match result.and_then(|value| drained.map(|()| value)) {
            Ok(value) => self.route(&rewrite, value),
            Err(e) => {
                let message = e.to_string();
                tracing::error!("evaluation failed: {message}");
                self.caps.error(&message);
                Outcome::Failed(message)
            }
        }
    }

    async fn execute(&self, rewrite: &Rewrite) -> Result<Dynamic, EvalError> {
        let steps = self.compile(rewrite)?;
        self.install(&rewrite.bindings, &steps);
        // Functions are defined even if a later statement throws
        for name in self.command_functions(&steps) {
            self.registry.register(&name, Handler::Script { name: name.clone() });
        }

        let mut result = Dynamic::UNIT;
        for step in &steps {
            result = match step {
                Step::Script(ast) => {
                    let value = self.run_ast(ast)?;
                    self.settle(value).await?
                }
                Step::Await { target, ast } => {
                    let pending = self.run_ast(ast)?;
                    let value = self.settle(pending).await?;
                    if let Some(target) = target {
                        self.assign(target, value.clone());
                    }
                    value
                }
            };
        }

        if rewrite.suspends && !rewrite.reports {
            tracing::warn!("asynchronous fragment finished without reporting a result");
            self.caps
                .report("note: awaited results are not echoed; use E.echo or E.report");
        }
        Ok(result)
    }

    /// Named functions taking the surface parameter
    fn command_functions(&self, steps: &[Step]) -> Vec<String> {
        steps
            .iter()
            .flat_map(|step| step.ast().iter_functions())
            .filter(|f| is_identifier(f.name) && f.params.iter().any(|p| *p == self.surface_param))
            .map(|f| f.name.to_string())
            .collect()
    }

    fn reset_temporaries(&self, temporaries: &[String]) {
        let mut env = self.env.borrow_mut();
        for name in temporaries {
            if env.scope.contains(name) {
                env.scope.set_or_push(name.as_str(), Dynamic::UNIT);
            }
        }
    }

    fn route(&self, rewrite: &Rewrite, value: Dynamic) -> Outcome {
        if let Some(sig) = &rewrite.leading_fn {
            if !sig.takes(&self.surface_param) {
                return Outcome::Defined(sig.name.clone());
            }
            self.caps.echo(&sig.name, Some("function"));
            return Outcome::Registered(sig.name.clone());
        }

        let named = rewrite
            .echo_name
            .as_ref()
            .map(|name| self.get(name).unwrap_or(Dynamic::UNIT));

        if self.prefix.get().is_some_and(|p| p.is_truthy()) {
            let text = format!("\n{}", display(named.as_ref().unwrap_or(&value)));
            self.caps.insert_text(&text);
            return Outcome::Inserted(text);
        }
        if rewrite.suspends {
            return Outcome::Silent;
        }
        if let Some(named) = named {
            return self.echo(&named);
        }
        if is_silent(&value) {
            return Outcome::Silent;
        }
        self.echo(&value)
    }

    fn echo(&self, value: &Dynamic) -> Outcome {
        let text = display(value);
        let kind = kind_of(value);
        self.caps.echo(&text, Some(&kind));
        Outcome::Echoed { text, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::testing::engine;
    use crate::surface::PrefixArg;
    use crate::surface::testing::Event;

    fn echoed(text: &str, kind: &str) -> Outcome {
        Outcome::Echoed {
            text: text.to_string(),
            kind: kind.to_string(),
        }
    }

    fn int(engine: &ScriptEngine, name: &str) -> Option<i64> {
        engine.get(name).and_then(|v| v.as_int().ok())
    }

    #[tokio::test]
    async fn declarations_persist_and_echo() {
        let (engine, surface) = engine();
        assert_eq!(engine.evaluate("let x = 1 + 2").await, echoed("3", "number"));
        assert_eq!(engine.evaluate("x * 10").await, echoed("30", "number"));
        assert_eq!(
            surface.echoes(),
            vec![
                ("3".to_string(), Some("number".to_string())),
                ("30".to_string(), Some("number".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn destructuring_binds_persistently_and_silently() {
        let (engine, surface) = engine();
        assert_eq!(
            engine.evaluate("let {p, q} = #{p: 5, q: 6}").await,
            Outcome::Silent
        );
        assert_eq!(int(&engine, "p"), Some(5));
        assert_eq!(int(&engine, "q"), Some(6));
        assert!(surface.events().is_empty());
        assert!(engine.get("destructured_0").is_some_and(|v| v.is_unit()));
    }

    #[tokio::test]
    async fn array_destructuring_with_rest() {
        let (engine, _) = engine();
        engine.evaluate("let [a, , b, ...rest] = [1, 2, 3, 4, 5]").await;
        assert_eq!(int(&engine, "a"), Some(1));
        assert_eq!(int(&engine, "b"), Some(3));
        assert_eq!(engine.evaluate("rest").await, echoed("[4, 5]", "array"));
    }

    #[tokio::test]
    async fn destructuring_evaluates_shared_rhs_once() {
        let (engine, surface) = engine();
        engine
            .evaluate(r#"fn pair(E) { E.report("called"); #{a: 1, b: 2} }"#)
            .await;
        engine
            .evaluate("let {a} = pair(E);\nlet {b} = pair(E);")
            .await;
        assert_eq!(surface.reports(), vec!["called"]);
        assert_eq!(int(&engine, "a"), Some(1));
        assert_eq!(int(&engine, "b"), Some(2));
    }

    #[tokio::test]
    async fn block_scoped_declarations_escape_their_block() {
        let (engine, _) = engine();
        assert_eq!(
            engine.evaluate("if true { let y = 2; }").await,
            Outcome::Silent
        );
        assert_eq!(engine.evaluate("y").await, echoed("2", "number"));
    }

    #[tokio::test]
    async fn function_with_surface_param_becomes_a_command() {
        let (engine, surface) = engine();
        assert_eq!(
            engine.evaluate(r#"fn greet(E) { E.echo("hi") }"#).await,
            Outcome::Registered("greet".to_string())
        );
        assert_eq!(
            surface.echoes(),
            vec![("greet".to_string(), Some("function".to_string()))]
        );
        assert!(engine.registry().contains("greet"));

        surface.clear();
        engine.dispatch("greet").await.unwrap();
        assert_eq!(
            surface.echoes(),
            vec![("hi".to_string(), Some("string".to_string()))]
        );
    }

    #[tokio::test]
    async fn plain_functions_are_defined_silently() {
        let (engine, surface) = engine();
        assert_eq!(
            engine.evaluate("fn add(a, b) { a + b }").await,
            Outcome::Defined("add".to_string())
        );
        assert!(surface.events().is_empty());
        assert!(!engine.registry().contains("add"));
        assert_eq!(engine.evaluate("add(2, 3)").await, echoed("5", "number"));
    }

    #[tokio::test]
    async fn later_functions_are_harvested_too() {
        let (engine, _) = engine();
        engine
            .evaluate("let n = 1;\nfn later(E) { E.echo(\"later\") }\nfn helper(x) { x }")
            .await;
        assert!(engine.registry().contains("later"));
        assert!(!engine.registry().contains("helper"));
    }

    #[tokio::test]
    async fn redefinition_replaces_the_command() {
        let (engine, surface) = engine();
        engine.evaluate(r#"fn greet(E) { E.echo("one") }"#).await;
        engine.evaluate(r#"fn greet(E) { E.echo("two") }"#).await;
        surface.clear();
        engine.dispatch("greet").await.unwrap();
        assert_eq!(surface.echoes()[0].0, "two");
        assert_eq!(engine.registry().names(), vec!["greet"]);
    }

    #[tokio::test]
    async fn unit_and_empty_object_are_suppressed() {
        let (engine, surface) = engine();
        assert_eq!(engine.evaluate("()").await, Outcome::Silent);
        assert_eq!(engine.evaluate("#{}").await, Outcome::Silent);
        assert_eq!(engine.evaluate("let s = 0; s = 1;").await, echoed("1", "number"));
        assert_eq!(
            engine.evaluate(r#""text""#).await,
            echoed("text", "string")
        );
        assert_eq!(surface.echoes().len(), 2);
    }

    #[tokio::test]
    async fn truthy_prefix_inserts_instead_of_echoing() {
        let (engine, surface) = engine();
        let outcome = {
            let _guard = engine.prefix().scoped(Some(PrefixArg::Flag(true)));
            engine.evaluate("let z = 7").await
        };
        assert_eq!(outcome, Outcome::Inserted("\n7".to_string()));
        assert_eq!(surface.events(), vec![Event::Insert("\n7".to_string())]);
    }

    #[tokio::test]
    async fn falsy_prefix_still_echoes() {
        let (engine, surface) = engine();
        let _guard = engine.prefix().scoped(Some(PrefixArg::Count(0)));
        assert_eq!(engine.evaluate("6 * 7").await, echoed("42", "number"));
        assert!(surface.events().iter().all(|e| !matches!(e, Event::Insert(_))));
    }

    #[tokio::test]
    async fn errors_are_reported_not_raised() {
        let (engine, surface) = engine();
        assert!(matches!(engine.evaluate("1 +").await, Outcome::Failed(_)));
        let outcome = engine.evaluate(r#"throw "boom""#).await;
        assert!(matches!(&outcome, Outcome::Failed(msg) if msg.contains("boom")));
        assert_eq!(surface.errors().len(), 2);
        assert!(surface.echoes().is_empty());
    }

    #[tokio::test]
    async fn parse_errors_abort_before_side_effects() {
        let (engine, surface) = engine();
        let outcome = engine
            .evaluate("E.report(\"first\");\nawait E.sleep(1);\nlet = 3")
            .await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(surface.reports().is_empty());
    }

    #[tokio::test]
    async fn await_settles_host_operations() {
        let (engine, surface) = engine();
        let outcome = engine
            .evaluate("let out = await E.run(\"ls\");\nE.echo(out.stdout)")
            .await;
        assert_eq!(outcome, Outcome::Silent);
        assert_eq!(
            surface.events(),
            vec![
                Event::Subprocess("ls".to_string()),
                Event::Echo("ran ls".to_string(), Some("string".to_string())),
            ]
        );
        assert_eq!(
            engine.get("out").map(|v| kind_of(&v)),
            Some("object".to_string())
        );
    }

    #[tokio::test]
    async fn awaiting_without_reporting_leaves_a_note() {
        let (engine, surface) = engine();
        assert_eq!(engine.evaluate("await E.sleep(1)").await, Outcome::Silent);
        assert_eq!(surface.reports().len(), 1);
        assert!(surface.reports()[0].starts_with("note:"));
    }

    #[tokio::test]
    async fn cancelled_choice_awaits_to_unit() {
        let (engine, surface) = engine();
        surface.answer(None);
        engine
            .evaluate(r#"let pick = await E.choose("Pick", ["a", "b"]); E.report(pick)"#)
            .await;
        assert_eq!(surface.reports(), vec!["()"]);
    }

    #[tokio::test]
    async fn nested_await_is_an_error() {
        let (engine, surface) = engine();
        let outcome = engine.evaluate("if true { await E.sleep(1) }").await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(surface.errors()[0].contains("top-level"));
    }

    #[tokio::test]
    async fn unawaited_operations_still_run() {
        let (engine, surface) = engine();
        let outcome = engine.evaluate("E.run(\"ls\");\nE.echo(\"started\")").await;
        assert_eq!(outcome, Outcome::Silent);
        assert_eq!(
            surface.events(),
            vec![
                Event::Echo("started".to_string(), Some("string".to_string())),
                Event::Subprocess("ls".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn a_bare_operation_echoes_its_result() {
        let (engine, surface) = engine();
        let outcome = engine.evaluate(r#"E.run("ls")"#).await;
        assert!(matches!(&outcome, Outcome::Echoed { kind, .. } if kind == "object"));
        assert_eq!(surface.events()[0], Event::Subprocess("ls".to_string()));
    }

    #[tokio::test]
    async fn operations_run_once_however_often_awaited() {
        let (engine, surface) = engine();
        engine.evaluate(r#"let p = E.run("ls")"#).await;
        engine
            .evaluate("let a = await p;\nlet b = await p;\nE.report(a.stdout == b.stdout)")
            .await;
        let runs = surface
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Subprocess(_)))
            .count();
        assert_eq!(runs, 1);
        assert_eq!(surface.reports(), vec!["true"]);
    }

    #[tokio::test]
    async fn stored_operations_echo_what_they_are() {
        let (engine, _) = engine();
        assert_eq!(
            engine.evaluate("let p = E.sleep(5)").await,
            echoed("<pending sleep 5ms>", "Pending")
        );
    }

    #[tokio::test]
    async fn commands_survive_a_later_throw() {
        let (engine, surface) = engine();
        let outcome = engine.evaluate("fn cmd(E) { E.echo(1) }\nthrow \"x\"").await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(engine.registry().contains("cmd"));

        surface.clear();
        engine.dispatch("cmd").await.unwrap();
        assert_eq!(surface.echoes()[0].0, "1");
    }

    #[tokio::test]
    async fn failed_subprocess_fails_the_evaluation() {
        let (engine, surface) = engine();
        surface.fail_subprocesses("no such program");
        let outcome = engine
            .evaluate("let out = await E.run(\"make\");\nE.echo(out)")
            .await;
        assert!(matches!(&outcome, Outcome::Failed(msg) if msg.contains("make")));
        assert_eq!(surface.errors().len(), 1);
        assert!(surface.errors()[0].contains("no such program"));
        assert!(surface.echoes().is_empty());
    }

    #[tokio::test]
    async fn unawaited_failures_are_reported() {
        let (engine, surface) = engine();
        surface.fail_subprocesses("no such program");
        let outcome = engine.evaluate("E.run(\"make\");\nE.report(\"after\")").await;
        assert!(matches!(&outcome, Outcome::Failed(msg) if msg.contains("make")));
        assert_eq!(surface.reports(), vec!["after"]);
        assert_eq!(surface.errors().len(), 1);
    }

    #[tokio::test]
    async fn throwing_continuation_fails_the_evaluation() {
        let (engine, surface) = engine();
        let outcome = engine
            .evaluate("await E.sleep(1).then(|v| throw \"late\");\nE.report(\"unreached\")")
            .await;
        assert!(matches!(&outcome, Outcome::Failed(msg) if msg.contains("late")));
        assert_eq!(surface.errors().len(), 1);
        assert!(surface.reports().is_empty());
    }
}
