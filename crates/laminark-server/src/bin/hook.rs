//! Laminark hook binary (`hook`): reads one [`HookEvent`] as JSON from
//! stdin, routes it through [`HookIngest`], and writes assembled context
//! to stdout on `SessionStart` only. Always exits 0 (§4.4, §6) so a
//! malformed event or a storage hiccup never disrupts the host agent.

use std::io::{self, Read};
use std::path::PathBuf;

use laminark_core::hooks::HookOutcome;
use laminark_core::orchestrator::default_data_dir;
use laminark_core::{HookEvent, Orchestrator, ProjectHash};
use tracing::{error, warn, Level};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let debug = matches!(std::env::var("LAMINARK_DEBUG").as_deref(), Ok("1") | Ok("true"));
    let default_level = if debug { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();
}

fn data_dir() -> PathBuf {
    std::env::var("LAMINARK_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| default_data_dir())
}

fn main() {
    init_logging();

    let mut raw = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut raw) {
        warn!("failed to read hook event from stdin: {e}");
        return;
    }

    let event: HookEvent = match serde_json::from_str(&raw) {
        Ok(event) => event,
        Err(e) => {
            warn!("malformed hook event, dropping: {e}");
            return;
        }
    };

    let data_dir = data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!("failed to create data directory {}: {e}", data_dir.display());
        return;
    }

    let project = ProjectHash::for_path(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let orchestrator = match Orchestrator::new(&data_dir, project) {
        Ok(o) => o,
        Err(e) => {
            error!("failed to open store for hook event: {e}");
            return;
        }
    };

    match orchestrator.hook_ingest().handle(event) {
        Ok(HookOutcome::SessionStarted { context }) => {
            print!("{context}");
        }
        Ok(outcome) => {
            tracing::debug!("hook event handled: {outcome:?}");
        }
        Err(e) => {
            error!("hook event failed: {e}");
        }
    }
}
