use crate::core::error::AskError;
use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_ENV_VAR: &str = "ASK_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    None,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Some(LogLevel::None),
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            LogLevel::None => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::None => "NONE",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// `--log` wins over `--debug`, which wins over `ASK_LOG`.
pub fn resolve_level(flag: Option<LogLevel>, debug: bool, env: Option<&str>) -> LogLevel {
    if let Some(level) = flag {
        return level;
    }
    if debug {
        return LogLevel::Debug;
    }
    env.and_then(LogLevel::parse).unwrap_or_default()
}

/// Installs the global subscriber. Logs go to stderr unless `logfile` is
/// given, in which case they are appended to it without colors.
pub fn init(level: LogLevel, logfile: Option<&Path>) -> Result<(), AskError> {
    let filter = EnvFilter::try_new(level.directive())
        .map_err(|e| AskError::Config(format!("Invalid log filter: {}", e)))?;

    let (writer, ansi) = match logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AskError::Config(format!("Failed to open log file {}: {}", path.display(), e))
                })?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .try_init()
        .map_err(|e| AskError::Config(format!("Failed to initialize logging: {}", e)))
}
