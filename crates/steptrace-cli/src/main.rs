//! Step tracer CLI.
//!
//! Provides the `steptrace` binary: reads one JSON request
//! (`code`, `functionName`, `parameterValue`) from stdin or `--input`,
//! traces the call, and writes exactly one JSON response to stdout.
//! Failures are reported in the response, so the exit status is always 0.
//!
//! Logs go to stderr, filtered by `STEPTRACE_LOG` (default: `warn`).

use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use steptrace_trace::{handle_json, Response, TraceConfig, Tracer};

/// Trace a function line by line.
#[derive(Parser)]
#[command(name = "steptrace", about = "Trace a script function line by line")]
struct Cli {
    /// Read the request from this file instead of stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Pretty-print the response.
    #[arg(long)]
    pretty: bool,

    /// Maximum nested call depth (overrides STEPTRACE_MAX_CALL_DEPTH).
    #[arg(long)]
    max_call_depth: Option<usize>,

    /// Maximum container nesting copied per variable (overrides STEPTRACE_SNAPSHOT_DEPTH).
    #[arg(long)]
    snapshot_depth: Option<usize>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let mut config = TraceConfig::from_env();
    if let Some(depth) = cli.max_call_depth {
        config.max_call_depth = depth;
    }
    if let Some(depth) = cli.snapshot_depth {
        config.snapshot_max_depth = depth;
    }

    let response = match read_request(cli.input.as_ref()) {
        Ok(input) => {
            let mut tracer = Tracer::new(config);
            handle_json(&mut tracer, &input)
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request");
            Response::Failure {
                error: err.to_string(),
            }
        }
    };

    write_response(&response, cli.pretty);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("STEPTRACE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_request(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

/// Writes the response, falling back to a plain error object if it cannot
/// be serialized.
fn write_response(response: &Response, pretty: bool) {
    let text = match response.to_json(pretty) {
        Ok(text) => text,
        Err(err) => {
            serde_json::json!({ "error": format!("failed to serialize response: {err}") }).to_string()
        }
    };
    let mut stdout = io::stdout().lock();
    if let Err(err) = writeln!(stdout, "{text}").and_then(|_| stdout.flush()) {
        tracing::error!(error = %err, "failed to write response");
    }
}
