//! Error types for the deployer

use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Failed to spawn `{command}`: {reason}")]
    SpawnError { command: String, reason: String },

    #[error("Command `{command}` exited with status {code}{}", format_stderr(.stderr))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<DeployError>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Missing secret: {0}")]
    MissingSecret(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Exit code to report for this error.
    ///
    /// A failed command propagates its own status; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::CommandFailed { code, .. } if *code > 0 => *code,
            DeployError::StepFailed { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}

fn format_stderr(stderr: &str) -> String {
    let tail: Vec<&str> = stderr.trim_end().lines().rev().take(5).collect();
    if tail.is_empty() {
        return String::new();
    }
    let tail: Vec<&str> = tail.into_iter().rev().collect();
    format!(": {}", tail.join(" | "))
}
