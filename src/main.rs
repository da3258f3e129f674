use std::env;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod dispatch;
mod editor;
mod error;
mod finder;
mod host;
mod input;
mod scripting;
mod session;
mod surface;

use config::{SettingsStore, TriggerStore};
use editor::Document;
use host::TerminalHost;
use scripting::ScriptEngine;
use session::Session;
use surface::Capabilities;

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("easel=info")),
        )
        .with_writer(io::stderr)
        .init();

    // Parse command line args
    let args: Vec<String> = env::args().collect();
    let document = match args.get(1) {
        Some(path) => Document::open(PathBuf::from(path))?,
        None => Document::new(),
    };

    let settings = Rc::new(match config::settings_file() {
        Some(path) => SettingsStore::open(path),
        None => SettingsStore::in_memory(),
    });
    let triggers = Rc::new(match config::keybindings_file() {
        Some(path) => TriggerStore::open(path),
        None => TriggerStore::in_memory(),
    });

    let input = Rc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let host = Rc::new(TerminalHost::new(document, settings.clone(), input.clone()));
    let engine = ScriptEngine::new(host.clone(), settings, triggers.clone());
    session::register_builtins(&engine, triggers.clone());

    if let Err(e) = engine.load_default().await {
        tracing::error!("init script failed: {e}");
        host.error(&e.to_string());
    }

    Session::new(host, engine, triggers, input).run().await
}
