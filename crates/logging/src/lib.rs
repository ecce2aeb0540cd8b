//! Pocket Logging
//!
//! Logging setup for applications embedding the relay client.
//!
//! ## Usage
//!
//! ```no_run
//! use pocket_logging::{try_init, LogLevel};
//!
//! try_init(LogLevel::from_verbose(true)).ok();
//! ```
//!
//! `RUST_LOG` takes precedence over the level passed in.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Crates whose events follow the selected level; everything else logs warnings only
const POCKET_TARGETS: &[&str] = &[
    "pocket_core",
    "pocket_routing",
    "pocket_rpc",
    "pocket_session",
    "pocket_client",
    "pocket_settings",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `true` → `Debug`, `false` → `Info`
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    /// `0` → `Info`, `1` → `Debug`, `2+` → `Trace`
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Filter directives: this level for the client crates, `warn` for dependencies
    pub fn directives(&self) -> String {
        let mut directives = vec!["warn".to_string()];
        directives.extend(
            POCKET_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, self.as_str())),
        );
        directives.join(",")
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directives()))
}

/// Initialize logging, reporting on stderr if a subscriber is already set
pub fn init(level: LogLevel) {
    if let Err(e) = try_init(level) {
        eprintln!("Logging not initialized: {}", e);
    }
}

/// Try to initialize logging, returning an error if already initialized
pub fn try_init(level: LogLevel) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(false)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Initialize logging with the event target shown
pub fn try_init_with_target(level: LogLevel, show_target: bool) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(show_target)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Debug logging captured by the test harness; safe to call from every test
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(LogLevel::Debug.directives()))
        .with_test_writer()
        .try_init();
}
