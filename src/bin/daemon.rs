//! Gallerist daemon for background re-indexing.
//!
//! Every poll tick the daemon re-indexes the watched folders flagged
//! `auto_reindex`, so new and edited pictures show up without a manual
//! `gallerist reindex`. It shares the catalog database with the CLI.
//!
//! ## Usage
//!
//! ```bash
//! gallerist-daemon              # Run in foreground
//! gallerist-daemon --once       # Re-index once and exit
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use gallerist::config::Config;
use gallerist::logging::{self, LogTarget};
use gallerist::Catalog;

/// Command line options
#[derive(Debug, Default)]
struct DaemonOptions {
    /// Overrides `daemon.poll_interval_secs` from the config file
    poll_interval: Option<u64>,
    /// Run once and exit
    once: bool,
    /// Config path override
    config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let options = parse_args();

    let _ = logging::init(Some(Config::config_dir().join("logs")), LogTarget::Background);

    info!("Gallerist daemon starting...");

    let config = match options.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Config loaded");

    let catalog = Catalog::open(&config)
        .with_context(|| format!("Failed to open catalog at {}", config.db_path().display()))?;
    info!("Catalog opened at {:?}", config.db_path());

    if options.once {
        info!("Running in single-shot mode");
        reindex(&catalog)?;
    } else {
        let interval = options
            .poll_interval
            .unwrap_or(config.daemon.poll_interval_secs)
            .max(1);
        info!("Running in daemon mode, polling every {} seconds", interval);
        run_daemon_loop(&catalog, interval);
    }

    info!("Gallerist daemon stopped");
    Ok(())
}

fn parse_args() -> DaemonOptions {
    let args: Vec<String> = std::env::args().collect();
    let mut options = DaemonOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                options.once = true;
            }
            "--interval" | "-i" => {
                match args.get(i + 1).and_then(|v| v.parse().ok()) {
                    Some(interval) => options.poll_interval = Some(interval),
                    None => {
                        eprintln!("Error: --interval requires a number of seconds");
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    options.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn print_help() {
    println!(
        r#"gallerist-daemon - Background re-indexing for Gallerist

USAGE:
    gallerist-daemon [OPTIONS]

OPTIONS:
    --once, -1          Re-index auto folders once and exit
    --interval, -i N    Poll interval in seconds (default: daemon.poll_interval_secs)
    --config, -c PATH   Path to config file
    --help, -h          Show this help message

ENVIRONMENT:
    GALLERIST_CONFIG    Path to config file (overrides default location)
    GALLERIST_LOG       Log level (trace, debug, info, warn, error)

Only watched folders registered with --auto are re-indexed:
    gallerist watch add ~/Pictures --auto
"#
    );
}

fn run_daemon_loop(catalog: &Catalog, poll_interval: u64) {
    loop {
        if let Err(e) = reindex(catalog) {
            error!("Re-index pass failed: {}", e);
        }

        thread::sleep(Duration::from_secs(poll_interval));
    }
}

fn reindex(catalog: &Catalog) -> Result<()> {
    let summary = catalog
        .reindex_auto_folders()
        .context("Failed to re-index watched folders")?;

    info!(
        "Pass complete: {} folders, {} failed, {} pictures indexed",
        summary.folders_indexed, summary.folders_failed, summary.pictures_indexed
    );
    Ok(())
}
