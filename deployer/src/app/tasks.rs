//! Named task shortcuts
//!
//! Each task passes straight through to one command or to one of the
//! built-in workflows. Tasks add no error handling of their own; a failing
//! command's exit status becomes the task's exit status.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use secrecy::SecretString;

use crate::deploy::runner::CommandSpec;
use crate::errors::DeployError;
use crate::storage::settings::Settings;

/// Monitoring agent credential forwarded by `docker-run`
pub const API_KEY_VAR: &str = "DD_API_KEY";

/// Task names accepted by `apmdeploy task`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Task {
    /// Install system dependencies
    Install,
    /// Run the app in the foreground
    Run,
    /// Run the Flask dev server with debug enabled
    Dev,
    /// Run the smoke test batch against the local app
    Test,
    /// Build the app image
    DockerBuild,
    /// Run the app image with the monitoring API key
    DockerRun,
    /// Deploy the app
    Deploy,
    /// Remove Python bytecode caches
    Clean,
}

/// What a task resolves to
#[derive(Debug)]
pub enum TaskAction {
    InstallDeps,
    Deploy,
    Smoke,
    Clean(PathBuf),
    Command(CommandSpec),
}

/// Resolve `task` for a source tree.
///
/// `lookup` reads environment variables; only `docker-run` uses it.
pub fn resolve_task(
    task: Task,
    settings: &Settings,
    source_dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<TaskAction, DeployError> {
    let port = settings.app_port.to_string();

    let action = match task {
        Task::Install => TaskAction::InstallDeps,
        Task::Deploy => TaskAction::Deploy,
        Task::Test => TaskAction::Smoke,
        Task::Clean => TaskAction::Clean(source_dir.to_path_buf()),
        Task::Run => TaskAction::Command(
            CommandSpec::new("python3")
                .arg("app.py")
                .current_dir(source_dir)
                .interactive(),
        ),
        Task::Dev => TaskAction::Command(
            CommandSpec::new("flask")
                .args(["--app", "app", "run", "--debug", "--port", port.as_str()])
                .env("FLASK_ENV", "development")
                .current_dir(source_dir)
                .interactive(),
        ),
        Task::DockerBuild => TaskAction::Command(
            CommandSpec::new("docker")
                .args(["build", "-t", settings.docker_image.as_str(), "."])
                .current_dir(source_dir)
                .interactive(),
        ),
        Task::DockerRun => {
            let api_key = lookup(API_KEY_VAR)
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    DeployError::MissingSecret(format!(
                        "{} must be set for docker-run",
                        API_KEY_VAR
                    ))
                })?;
            TaskAction::Command(
                CommandSpec::new("docker")
                    .args(["run", "--rm", "-p"])
                    .arg(format!("{}:{}", port, port))
                    .args(["-e", API_KEY_VAR, settings.docker_image.as_str()])
                    .secret_env(API_KEY_VAR, SecretString::from(api_key))
                    .interactive(),
            )
        }
    };

    Ok(action)
}
