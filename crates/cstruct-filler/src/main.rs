//! cstruct-filler: drains the fact queue into the corpus.
//!
//! Start it before any analysis process that uses the queue backend. It
//! prints a JSON report on stdout when it stops.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cstruct_core::config::{CliOverrides, CstructConfig};
use cstruct_core::errors::{CstructError, CstructErrorCode};
use cstruct_core::tracing::init_tracing;
use cstruct_storage::transport::{Daemon, DaemonReport, StopHandle};

#[derive(Parser, Debug)]
#[command(name = "cstruct-filler")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Commit every fact on its own instead of batching
    #[arg(short, long)]
    autocommit: bool,

    /// Remove a stale queue socket left by a previous filler
    #[arg(short, long)]
    unlink: bool,

    /// Corpus database file
    #[arg(short, long)]
    database: Option<String>,

    /// Queue socket path
    #[arg(short, long)]
    queue: Option<String>,

    /// Directory holding cstruct.toml
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Commit and exit when standard input is closed
    #[arg(long)]
    stdin_stop: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            database: self.database.clone(),
            autocommit: self.autocommit.then_some(true),
            queue_path: self.queue.clone(),
            unlink_stale: self.unlink.then_some(true),
            ..Default::default()
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!(error = %e, "could not serialize report"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e.diagnostic(), "filler failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<DaemonReport, CstructError> {
    let config = CstructConfig::load(&args.root, Some(&args.overrides()))?;
    let daemon = Daemon::start(&config)?;
    if args.stdin_stop {
        stop_on_stdin_eof(daemon.stop_handle());
    }
    daemon.run()
}

fn stop_on_stdin_eof(stop: StopHandle) {
    std::thread::spawn(move || {
        let mut sink = [0u8; 256];
        let mut stdin = std::io::stdin().lock();
        while matches!(stdin.read(&mut sink), Ok(n) if n > 0) {}
        tracing::info!("stdin closed; stopping");
        stop.stop();
    });
}
