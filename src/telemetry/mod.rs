//! Structured logging for the evidence stack.
//!
//! Ported from the teacher's `core::logging` module: a `log` + `env_logger`
//! backend, a `LoggerConfig`/`init_logger` entry point, and a small
//! formatting helper module for consistent, colorized trace output of chain
//! appends, VDF timings, and packet assembly.

pub mod formatter;
pub mod performance;

pub use formatter::*;
pub use performance::*;

use log::{debug, info};

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub show_timestamps: bool,
    pub show_colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            show_timestamps: true,
            show_colors: true,
        }
    }
}

/// Initialize the logging backend. Safe to call more than once; subsequent
/// calls are no-ops (mirrors `env_logger::try_init`'s idempotence).
pub fn init_logger(config: Option<LoggerConfig>) {
    let config = config.unwrap_or_default();
    std::env::set_var("RUST_LOG", config.level.as_str());

    match env_logger::try_init() {
        Ok(_) => {
            info!("witnessd-core logger initialized");
            debug!("log level: {}", config.level.as_str());
        }
        Err(_) => {
            debug!("logger already initialized, skipping");
        }
    }
}
