mod class_analytics;
mod classroom;
mod config;
mod content;
mod db;
mod error;
mod ipc;
mod logging;
mod metrics;
mod proctoring;
mod records;
mod snapshot;
mod student_analytics;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

/// Classroom management daemon: newline-delimited JSON requests on stdin,
/// one JSON response per line on stdout.
#[derive(Parser, Debug)]
#[command(name = "classroomd", version, about)]
struct Args {
    /// TOML config file.
    #[arg(long, env = "CLASSROOMD_CONFIG")]
    config: Option<PathBuf>,

    /// Open this workspace before reading requests.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `classroomd=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::Config::load(args.config.as_deref())?;
    logging::init(&config.logging, args.log_level.as_deref());

    let flush_target = snapshot::FlushTarget::default();
    if config.snapshot.enabled {
        snapshot::spawn_flusher(config.snapshot.clone(), flush_target.clone())
            .context("failed to start snapshot thread")?;
    }

    let mut state = ipc::AppState::new(config, flush_target);
    if let Some(path) = args.workspace {
        ipc::select_workspace(&mut state, path.clone())
            .with_context(|| format!("failed to open workspace {}", path.to_string_lossy()))?;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "classroomd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                let id = req.id.clone();
                let method = req.method.clone();
                match panic::catch_unwind(AssertUnwindSafe(|| ipc::handle_request(&mut state, req))) {
                    Ok(resp) => resp,
                    Err(_) => {
                        tracing::error!(%method, "handler panicked");
                        ipc::err(&id, "internal", format!("{} failed unexpectedly", method), None)
                    }
                }
            }
            // Without an id the caller cannot correlate the reply.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
