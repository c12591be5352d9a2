//! Logging configuration

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::DeployError;

/// Log level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Write logs to stderr
    pub stderr: bool,

    /// Directory for the deploy run log; `None` disables file output
    pub log_dir: Option<PathBuf>,

    /// File name inside `log_dir`
    pub log_file_name: String,

    /// Enable JSON format on the console layer
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stderr: true,
            log_dir: None,
            log_file_name: "deploy.log".to_string(),
            json_format: false,
        }
    }
}

/// Initialize logging.
///
/// Returns the file writer guard when file output is enabled; it must be held
/// until the process exits or buffered lines are lost.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, DeployError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let console = options.stderr.then(|| {
        if options.json_format {
            fmt::layer().json().with_writer(std::io::stderr).boxed()
        } else {
            fmt::layer().with_writer(std::io::stderr).boxed()
        }
    });

    let (file, guard) = match file_writer(&options) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer).boxed()),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| DeployError::ConfigError(e.to_string()))?;

    Ok(guard)
}

fn file_writer(
    options: &LogOptions,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = options.log_dir.as_ref()?;

    // The log dir may not exist yet (first deploy) or may not be writable
    // (non-root dry run). Console logging still works in both cases.
    if std::fs::create_dir_all(dir).is_err() {
        return None;
    }
    let probe = dir.join(&options.log_file_name);
    if std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
        .is_err()
    {
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, &options.log_file_name);
    Some(tracing_appender::non_blocking(appender))
}
