//! Logging setup.
//!
//! Journald on Linux when it is reachable, otherwise a daily rolling file
//! under the data directory. Interactive runs can ask for plain stderr
//! output instead.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where log lines should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Journald if available, file otherwise
    Background,
    /// Human-readable lines on stderr at debug level
    Stderr,
}

/// Initialize the logging system.
///
/// The level is read from `GALLERIST_LOG` (`debug`, `info`, `warn`,
/// `error`, or any `EnvFilter` directive) and defaults to `info`.
/// Calling this twice is harmless: the second subscriber is ignored.
pub fn init(log_dir: Option<PathBuf>, target: LogTarget) -> Result<()> {
    if target == LogTarget::Stderr {
        let env_filter =
            EnvFilter::try_from_env("GALLERIST_LOG").unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init();
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_env("GALLERIST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            if tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .try_init()
                .is_ok()
            {
                tracing::info!("Logging initialized with journald backend");
            }
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gallerist")
            .join("logs")
    });

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "gallerist.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer thread stops when the guard drops
    let _ = GUARD.set(guard);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .is_ok()
    {
        tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    }
    Ok(())
}
