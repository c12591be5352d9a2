//! External command execution

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::debug;

use crate::errors::DeployError;
use crate::utils::shell_quote;

/// A command to run, described as data so plans can be printed and tested
#[derive(Debug)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Passed to the child but never displayed
    pub secret_env: Vec<(String, SecretString)>,
    pub current_dir: Option<PathBuf>,
    /// Inherit stdio instead of capturing it (long-running or user-facing output)
    pub interactive: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            secret_env: Vec::new(),
            current_dir: None,
            interactive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn secret_env(mut self, key: impl Into<String>, value: SecretString) -> Self {
        self.secret_env.push((key.into(), value));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// The program and arguments as a single string (no env, no cwd)
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, shell_quote(value))?;
        }
        for (key, _) in &self.secret_env {
            write!(f, "{}=*** ", key)?;
        }
        write!(f, "{}", self.command_line())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs commands on behalf of the executor
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is not an error at this level;
    /// only failing to start the process is.
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, DeployError>;
}

/// Run `command` and turn a non-zero exit into [`DeployError::CommandFailed`]
pub async fn run_checked(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
) -> Result<CommandOutput, DeployError> {
    let output = runner.run(command).await?;
    if !output.success() {
        return Err(DeployError::CommandFailed {
            command: command.command_line(),
            code: output.code.unwrap_or(-1),
            stderr: output.stderr,
        });
    }
    Ok(output)
}

/// Runs commands on the local machine
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        debug!("Running: {}", spec);

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        for (key, value) in &spec.secret_env {
            command.env(key, value.expose_secret());
        }
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let spawn_error = |e: std::io::Error| DeployError::SpawnError {
            command: spec.command_line(),
            reason: e.to_string(),
        };

        if spec.interactive {
            let status = command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(spawn_error)?;
            return Ok(CommandOutput {
                code: status.code(),
                ..Default::default()
            });
        }

        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(spawn_error)?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
