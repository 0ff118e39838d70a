//! Process-mode host for `ctrlpath-solver` (spec §6 wire protocol).
//!
//! Reads one JSON request from stdin, writes one JSON response to stdout,
//! and exits zero as long as the request was well-formed — a refused
//! template (`InvalidTemplate`, `Cycle`, bad inventory override) is a
//! normal `{"ok": false, "error": ...}` response, not a process failure.
//! Only I/O errors and malformed JSON are process-level failures: those
//! exit non-zero with diagnostics on stderr.

use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use ctrlpath_core::Template;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Run a single ctrlpath request read from stdin.
#[derive(Parser, Debug)]
#[command(name = "ctrlpath", about = "Constraint-based scheduling core, process mode")]
struct Cli {
    /// Pretty-print the JSON response.
    #[arg(long)]
    pretty: bool,

    /// Increase log verbosity (stderr only; never affects stdout).
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all logging.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
enum Request {
    Solve {
        template: Template,
        #[serde(default)]
        inventory: Option<HashMap<String, u32>>,
    },
    Validate {
        template: Template,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read request from stdin")?;

    let request: Request = serde_json::from_str(&input).context("request is not valid JSON")?;

    let response = dispatch(request);

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .context("failed to serialize response")?;

    println!("{rendered}");
    std::io::stdout().flush().context("failed to flush stdout")?;

    Ok(())
}

#[tracing::instrument(skip(request))]
fn dispatch(request: Request) -> serde_json::Value {
    match request {
        Request::Solve { template, inventory } => {
            tracing::info!(template_id = %template.id, "dispatching solve");
            match ctrlpath_solver::solve(&template, inventory.as_ref()) {
                Ok(schedule) => serde_json::json!({ "ok": true, "data": schedule }),
                Err(err) => serde_json::json!({ "ok": false, "error": err.to_string() }),
            }
        }
        Request::Validate { template } => {
            tracing::info!(template_id = %template.id, "dispatching validate");
            let result = ctrlpath_solver::validate(&template);
            serde_json::json!({ "ok": true, "data": result })
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default_directive = if cli.quiet {
        "off"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .with_writer(std::io::stderr)
        .init();
}
