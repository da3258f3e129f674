//! Commands backed by a long-lived interpreter process.
//!
//! Usage in Rhai:
//! ```rhai
//! commands["Evaluate: Python"] = #{
//!     "ctrl+x p": E.repl(#{
//!         command: "python3 -i",
//!         prompt: ">>> ",
//!         error_markers: ["Error:", "^\\s+File "],
//!         echo: "overlay",
//!     })
//! };
//! ```
//!
//! Running the command sends the selection (or current line) to the
//! interpreter's stdin and echoes whatever it prints before its next prompt.
//! Output matching an error marker goes to the error channel instead. The
//! process is started on first use and restarted after it dies or times out.

use std::fmt;
use std::io;
use std::process::Stdio;
use std::rc::Rc;
use std::time::Duration;

use regex::Regex;
use rhai::{Array, Dynamic, FnPtr, INT, ImmutableString, Map};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::ScriptEngine;
use super::value::display;
use crate::config::EchoStyle;
use crate::error::EvalError;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// How long output must stay quiet after a prompt before the reply is complete
const QUIET: Duration = Duration::from_millis(50);

/// Where a REPL's results go
#[derive(Debug, Clone)]
pub enum ReplEcho {
    /// The configured echo style
    Default,
    Style(EchoStyle),
    /// A script function called with the output text
    Function(FnPtr),
}

#[derive(Debug, Clone)]
pub struct ReplOptions {
    pub command: String,
    pub prompt: String,
    pub error_markers: Vec<Regex>,
    pub echo: ReplEcho,
    /// Rewrites the output text before it is echoed
    pub stdout: Option<FnPtr>,
    pub timeout: Duration,
}

impl ReplOptions {
    /// Read `#{ command, prompt, error_markers, echo, stdout, timeout_ms }`
    pub fn from_map(map: &Map) -> Result<Self, String> {
        let text = |key: &str| {
            map.get(key)
                .and_then(|v| v.read_lock::<ImmutableString>().map(|s| s.to_string()))
        };
        let command = text("command")
            .filter(|c| !c.trim().is_empty())
            .ok_or("repl needs a `command` string")?;
        let prompt = text("prompt")
            .filter(|p| !p.trim().is_empty())
            .ok_or("repl needs a `prompt` string")?;

        let error_markers = match map.get("error_markers") {
            None => Vec::new(),
            Some(markers) => markers
                .read_lock::<Array>()
                .ok_or("`error_markers` must be an array of patterns")?
                .iter()
                .map(|marker| {
                    let pattern = display(marker);
                    Regex::new(&pattern).map_err(|e| format!("bad error marker `{pattern}`: {e}"))
                })
                .collect::<Result<_, _>>()?,
        };

        let echo = match map.get("echo") {
            None => ReplEcho::Default,
            Some(echo) if echo.is::<FnPtr>() => ReplEcho::Function(echo.clone().cast::<FnPtr>()),
            Some(echo) => {
                let name = display(echo);
                EchoStyle::parse(&name)
                    .map(ReplEcho::Style)
                    .ok_or_else(|| format!("unknown echo style `{name}`"))?
            }
        };

        let stdout = match map.get("stdout") {
            None => None,
            Some(f) if f.is::<FnPtr>() => Some(f.clone().cast::<FnPtr>()),
            Some(_) => return Err("`stdout` must be a function".to_string()),
        };

        let timeout_ms = match map.get("timeout_ms") {
            None => DEFAULT_TIMEOUT_MS,
            Some(ms) => ms
                .as_int()
                .ok()
                .and_then(|ms: INT| u64::try_from(ms).ok())
                .ok_or("`timeout_ms` must be a positive number")?,
        };

        Ok(Self {
            command,
            prompt,
            error_markers,
            echo,
            stdout,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn is_error(&self, output: &str) -> bool {
        output
            .lines()
            .any(|line| self.error_markers.iter().any(|marker| marker.is_match(line)))
    }
}

struct Interpreter {
    // Killed on drop
    _child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

/// A script value; clones share one interpreter process
#[derive(Clone)]
pub struct Repl {
    options: Rc<ReplOptions>,
    process: Rc<Mutex<Option<Interpreter>>>,
}

impl fmt::Debug for Repl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repl")
            .field("command", &self.options.command)
            .finish()
    }
}

impl fmt::Display for Repl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<repl {}>", self.options.command)
    }
}

impl Repl {
    pub fn new(options: ReplOptions) -> Self {
        Self {
            options: Rc::new(options),
            process: Rc::new(Mutex::new(None)),
        }
    }

    pub fn options(&self) -> &ReplOptions {
        &self.options
    }

    /// Send one fragment and collect what the interpreter prints before its
    /// next prompt, prompts removed.
    pub async fn send(&self, code: &str) -> Result<String, EvalError> {
        let mut process = self.process.lock().await;
        let result = match process.take() {
            Some(interpreter) => Ok(interpreter),
            None => self.start().await,
        };
        let result = match result {
            Ok(interpreter) => {
                let interpreter = process.insert(interpreter);
                self.exchange(interpreter, code).await
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            // Start over on the next send
            *process = None;
        }
        result.map_err(|source| EvalError::Subprocess {
            command: self.options.command.clone(),
            source,
        })
    }

    async fn start(&self) -> io::Result<Interpreter> {
        tracing::info!(command = %self.options.command, "starting interpreter");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("{{ {}\n}} 2>&1", self.options.command))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(io::Error::other("interpreter pipes unavailable"));
        };
        let mut interpreter = Interpreter {
            _child: child,
            stdin,
            stdout,
        };
        let banner = self.read_reply(&mut interpreter).await?;
        tracing::debug!(%banner, "interpreter ready");
        Ok(interpreter)
    }

    async fn exchange(&self, interpreter: &mut Interpreter, code: &str) -> io::Result<String> {
        interpreter.stdin.write_all(code.as_bytes()).await?;
        if !code.ends_with('\n') {
            interpreter.stdin.write_all(b"\n").await?;
        }
        interpreter.stdin.flush().await?;
        self.read_reply(interpreter).await
    }

    /// Read until a prompt ends the output and nothing more arrives
    async fn read_reply(&self, interpreter: &mut Interpreter) -> io::Result<String> {
        let marker = self.options.prompt.trim_end();
        let deadline = Instant::now() + self.options.timeout;
        let mut output = String::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = if output.trim_end().ends_with(marker) {
                match tokio::time::timeout(QUIET, interpreter.stdout.read(&mut chunk)).await {
                    Ok(read) => read?,
                    Err(_) => break,
                }
            } else {
                tokio::time::timeout_at(deadline, interpreter.stdout.read(&mut chunk))
                    .await
                    .map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no `{marker}` prompt within {:?}", self.options.timeout),
                        )
                    })??
            };
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "interpreter exited",
                ));
            }
            output.push_str(&String::from_utf8_lossy(&chunk[..read]));
        }
        Ok(strip_prompts(&output, marker))
    }
}

fn strip_prompts(output: &str, marker: &str) -> String {
    output
        .replace(marker, "")
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl ScriptEngine {
    /// Send the selection to a REPL and surface its reply
    pub(super) async fn run_repl(&self, repl: &Repl) -> Result<(), EvalError> {
        let code = self.caps.selection_or_current_line();
        if code.trim().is_empty() {
            return Ok(());
        }
        let output = repl.send(&code).await?;
        if output.is_empty() {
            return Ok(());
        }

        let options = repl.options();
        if options.is_error(&output) {
            tracing::debug!(command = %options.command, "interpreter reported an error");
            self.caps.error(&output);
            return Ok(());
        }

        let library = self.library();
        let text = match &options.stdout {
            Some(transform) => display(&transform.call::<Dynamic>(&self.engine, &library, (output,))?),
            None => output,
        };
        match &options.echo {
            ReplEcho::Default => self.caps.echo(&text, None),
            ReplEcho::Style(style) => self.caps.echo_as(*style, &text, None),
            ReplEcho::Function(echo) => {
                let value = echo.call::<Dynamic>(&self.engine, &library, (text,))?;
                self.settle(value).await?;
            }
        }
        Ok(())
    }
}
