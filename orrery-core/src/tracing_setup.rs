//! Tracing setup for Orrery
//!
//! The console shows what the operator asked for. The log file keeps every
//! event from Orrery's own crates, plus the open and close of each
//! `stream_session` span, so a session's lifetime and busy time can be read
//! back after the fact.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the per-run trace log inside the logs directory.
pub const LOG_FILE_NAME: &str = "orrery-last-run.log";

/// Directives for the log file: full detail for Orrery, warnings from dependencies.
pub const FILE_DIRECTIVES: &str = "warn,orrery=trace,orrery_core=trace,orrery_web=trace";

/// Console filter: `RUST_LOG` when set and parseable, else `level` for
/// Orrery's crates with dependencies held at warn.
pub fn console_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| {
            EnvFilter::new(format!(
                "warn,orrery={level},orrery_core={level},orrery_web={level}"
            ))
        })
}

/// Installs the console and file layers as the global subscriber.
///
/// The log file under `logs_dir` (default `./logs`) is truncated on each
/// run. Returns its path.
///
/// # Errors
/// - `Box<dyn std::error::Error>` - The logs directory or file cannot be
///   created, or a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let logs_dir = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_dir)?;
    let log_path = logs_dir.join(LOG_FILE_NAME);
    let log_file = File::create(&log_path)?;

    let rust_log = std::env::var("RUST_LOG").ok();
    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_filter(console_filter(console_level, rust_log.as_deref()));

    let session_file = fmt::layer()
        .with_ansi(false)
        .with_thread_names(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(FILE_DIRECTIVES));

    tracing_subscriber::registry()
        .with(console)
        .with(session_file)
        .try_init()?;

    tracing::debug!(
        console = %console_level,
        log_file = %log_path.display(),
        "Tracing initialized"
    );

    Ok(log_path)
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Session lifecycle and above
    #[default]
    Info,
    /// Per-batch details
    Debug,
    /// Everything, including per-message traces
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use orrery_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(CliLogLevel::Error),
            "warn" => Ok(CliLogLevel::Warn),
            "info" => Ok(CliLogLevel::Info),
            "debug" => Ok(CliLogLevel::Debug),
            "trace" => Ok(CliLogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}
