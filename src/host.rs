//! Terminal implementation of the capability surface.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::io::{BufReader, Lines, Stdin};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::{EchoStyle, PickerKind, SettingsStore};
use crate::editor::Document;
use crate::finder::{self, PickResult};
use crate::surface::{Capabilities, ProcessOutput};

/// Shared stdin; the session and the prompt take turns reading it
pub type LineReader = Mutex<Lines<BufReader<Stdin>>>;

pub struct TerminalHost {
    document: RefCell<Document>,
    settings: Rc<SettingsStore>,
    input: Rc<LineReader>,
}

impl TerminalHost {
    pub fn new(document: Document, settings: Rc<SettingsStore>, input: Rc<LineReader>) -> Self {
        Self {
            document: RefCell::new(document),
            settings,
            input,
        }
    }

    pub fn with_document<R>(&self, edit: impl FnOnce(&mut Document) -> R) -> R {
        edit(&mut self.document.borrow_mut())
    }

    async fn numbered_prompt(&self, prompt: &str, choices: &[String]) -> PickResult {
        for (i, choice) in choices.iter().enumerate() {
            println!("  {:>2}) {choice}", i + 1);
        }
        println!("{prompt} (number or name, empty to cancel):");
        match self.input.lock().await.next_line().await {
            Ok(Some(answer)) => finder::resolve_answer(&answer, choices),
            Ok(None) => PickResult::Cancelled,
            Err(e) => PickResult::Error(e.to_string()),
        }
    }
}

/// One echoed value in the configured style
pub fn render_echo(style: EchoStyle, text: &str, kind: Option<&str>) -> String {
    match (style, kind) {
        (EchoStyle::Notification, Some(kind)) => format!("{text} :: {kind}"),
        (EchoStyle::Notification, None) => text.to_string(),
        (EchoStyle::Overlay, _) => format!("⮕ {text}"),
        (EchoStyle::Status, Some(kind)) => format!("[{kind}] {text}"),
        (EchoStyle::Status, None) => format!("[] {text}"),
    }
}

#[async_trait(?Send)]
impl Capabilities for TerminalHost {
    fn selection_or_current_line(&self) -> String {
        self.document.borrow_mut().selection_or_current_line()
    }

    fn replace_selection(&self, text: &str) {
        self.document.borrow_mut().replace_selection(text);
    }

    fn insert_text(&self, text: &str) {
        self.document.borrow_mut().insert(text);
    }

    fn move_cursor(&self, line: usize, col: usize) {
        self.document.borrow_mut().goto(line, col);
    }

    fn echo(&self, text: &str, kind: Option<&str>) {
        self.echo_as(self.settings.settings().echo_style, text, kind);
    }

    fn echo_as(&self, style: EchoStyle, text: &str, kind: Option<&str>) {
        println!("{}", render_echo(style, text, kind));
    }

    fn report(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    async fn run_subprocess(&self, command: &str) -> io::Result<ProcessOutput> {
        let output = Command::new("sh").arg("-c").arg(command).output().await?;
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }

    async fn prompt_choice(&self, prompt: &str, choices: &[String]) -> Option<String> {
        let use_fzf = self.settings.settings().picker == PickerKind::Fzf && finder::fzf_available();
        let result = if use_fzf {
            let (prompt, owned) = (prompt.to_string(), choices.to_vec());
            tokio::task::spawn_blocking(move || finder::pick(&prompt, &owned))
                .await
                .unwrap_or_else(|e| PickResult::Error(e.to_string()))
        } else {
            self.numbered_prompt(prompt, choices).await
        };

        match result {
            PickResult::Selected(choice) => Some(choice),
            PickResult::Cancelled => None,
            PickResult::Error(e) => {
                tracing::warn!("picker failed: {e}");
                self.error(&e);
                None
            }
        }
    }
}
