//! Laminark MCP server binary (`serve`): JSON-RPC over stdio exposing the
//! six memory tools (§4.8) to a host agent.

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use laminark_core::{orchestrator::default_data_dir, Orchestrator, ProjectHash};

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

/// Parse command-line arguments and return the optional data directory path.
/// Returns `None` for the path if no `--data-dir` was specified.
/// Exits the process if `--help` or `--version` is requested.
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("Laminark MCP Server v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Local-first memory and context server using the Model Context Protocol.");
                println!();
                println!("USAGE:");
                println!("    serve [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Custom data directory");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                Log level filter (e.g., debug, info, warn, error)");
                println!("    LAMINARK_DEBUG=1        Shorthand for RUST_LOG=debug");
                println!();
                println!("EXAMPLES:");
                println!("    serve");
                println!("    serve --data-dir /custom/path");
                println!("    LAMINARK_DEBUG=1 serve");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("laminark-server {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: serve --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                let path = arg.strip_prefix("--data-dir=").unwrap_or("");
                if path.is_empty() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: serve --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(path));
            }
            arg => {
                eprintln!("error: unknown argument '{}'", arg);
                eprintln!("Usage: serve [OPTIONS]");
                eprintln!("Try 'serve --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    data_dir
}

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

#[tokio::main]
async fn main() {
    let data_dir = parse_args()
        .or_else(|| std::env::var("LAMINARK_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(default_data_dir);

    init_logging();

    info!("Laminark MCP server v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!("Failed to create data directory {}: {}", data_dir.display(), e);
        std::process::exit(1);
    }

    let project = ProjectHash::for_path(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let orchestrator = match Orchestrator::new(&data_dir, project) {
        Ok(o) => Arc::new(o),
        Err(e) => {
            error!("Failed to initialize orchestrator: {}", e);
            std::process::exit(1);
        }
    };
    info!("Orchestrator ready, data dir: {}", data_dir.display());

    orchestrator.spawn_background_loops();

    let server = McpServer::new(orchestrator);
    let transport = StdioTransport::new();

    info!("Starting MCP server on stdio...");
    if let Err(e) = transport.run(server).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Laminark MCP server shutting down");
}
