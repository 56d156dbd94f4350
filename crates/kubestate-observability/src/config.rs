//! Configuration for structured logging.
//!
//! Log level and format normally come from the exporter configuration file;
//! `RUST_LOG` takes over when no level is given.

use std::io;
use std::str::FromStr;
use thiserror::Error;

/// Dependencies whose `info` output is request-level noise for an exporter
const QUIET_TARGETS: &[&str] = &["hyper=warn", "h2=warn", "reqwest=warn", "rustls=warn"];

/// Errors that can occur during logging configuration
#[derive(Error, Debug)]
pub enum LogError {
    /// Format name not recognised
    #[error("Unknown log format: {0}. Expected one of: pretty, compact, json")]
    InvalidFormat(String),

    /// Level or directive rejected by the filter parser
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// IO failure
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Subscriber installed twice
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Output format for logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output with colors
    Pretty,

    /// Compact single-line format
    #[default]
    Compact,

    /// JSON format for log pipelines
    Json,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(LogError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Write to standard error
    Stderr,

    /// Write to standard output
    Stdout,
}

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format for logs
    pub format: LogFormat,

    /// Log level or full filter directive (e.g., "info", "kubestate_collectors=debug")
    /// If None, will be determined from RUST_LOG environment variable
    pub level: Option<String>,

    /// Whether to use colored output (ignored for Json)
    pub use_color: bool,

    /// Whether to include target module names
    pub include_targets: bool,

    /// Output destination (stderr by default)
    pub output: LogOutput,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Compact,
            level: None,
            use_color: true,
            include_targets: true,
            output: LogOutput::Stderr,
        }
    }
}

impl LogConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `observability` section of the exporter configuration
    pub fn from_settings(level: &str, format: &str) -> Result<Self, LogError> {
        Ok(Self::new().with_format(format.parse()?).with_level(level))
    }

    /// Set the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Enable or disable color output
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Enable or disable target module names
    pub fn with_targets(mut self, include_targets: bool) -> Self {
        self.include_targets = include_targets;
        self
    }

    /// Set the output destination
    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Get the effective level from config or environment
    pub fn get_effective_level(&self) -> String {
        self.level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }

    /// Filter directive actually installed
    ///
    /// A bare level is extended with quieter levels for HTTP dependencies;
    /// a directive that already names targets is used as is.
    pub fn filter_directive(&self) -> String {
        let level = self.get_effective_level();
        if level.contains('=') || level.contains(',') {
            level
        } else {
            let mut directive = level;
            for target in QUIET_TARGETS {
                directive.push(',');
                directive.push_str(target);
            }
            directive
        }
    }
}
