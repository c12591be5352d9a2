//! Entry points behind each CLI command

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::app::tasks::{resolve_task, Task, TaskAction};
use crate::deploy::run::{deploy, DeployOptions};
use crate::deploy::runner::{run_checked, CommandRunner};
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::health::probe::probe;
use crate::health::smoke::{run_smoke, SmokeOptions};
use crate::installer::install::install_deps;
use crate::render::write_all;
use crate::storage::settings::Settings;

/// `apmdeploy install-deps`
pub async fn cmd_install_deps(
    settings: &Settings,
    runner: &dyn CommandRunner,
    dry_run: bool,
) -> Result<i32, DeployError> {
    install_deps(settings, runner, dry_run).await?;
    Ok(0)
}

/// `apmdeploy deploy`
pub async fn cmd_deploy(
    settings: &Settings,
    options: &DeployOptions,
    runner: &dyn CommandRunner,
) -> Result<i32, DeployError> {
    deploy(settings, options, runner).await?;
    Ok(0)
}

/// `apmdeploy render`
pub async fn cmd_render(settings: &Settings, out_dir: &Path) -> Result<i32, DeployError> {
    let artifacts = write_all(settings, out_dir).await?;
    for artifact in &artifacts {
        println!("{:<20} {}", artifact.name, artifact.path.display());
    }
    Ok(0)
}

/// `apmdeploy probe`; exit code is the probe verdict
pub async fn cmd_probe(
    settings: &Settings,
    url: Option<String>,
    timeout: Duration,
) -> Result<i32, DeployError> {
    let url = url.unwrap_or_else(|| settings.local_health_url());
    let outcome = probe(&settings.app_name, &url, timeout).await?;
    info!("Probe of {} took {:?}", url, outcome.elapsed);
    println!("{}", outcome.message);
    Ok(outcome.exit_code())
}

/// `apmdeploy smoke`
pub async fn cmd_smoke(settings: &Settings, base_url: Option<String>) -> Result<i32, DeployError> {
    let options = SmokeOptions {
        base_url: base_url.unwrap_or_else(|| format!("http://localhost:{}", settings.app_port)),
        log_file: settings.app_log_file(),
        ..Default::default()
    };
    run_smoke(&options).await?;
    Ok(0)
}

/// `apmdeploy task <name>`
pub async fn cmd_task(
    task: Task,
    settings: &Settings,
    source_dir: &Path,
    runner: &dyn CommandRunner,
    dry_run: bool,
) -> Result<i32, DeployError> {
    let action = resolve_task(task, settings, source_dir, |key| std::env::var(key).ok())?;

    match action {
        TaskAction::InstallDeps => cmd_install_deps(settings, runner, dry_run).await,
        TaskAction::Deploy => {
            let options = DeployOptions {
                source_dir: source_dir.to_path_buf(),
                dry_run,
                ..Default::default()
            };
            cmd_deploy(settings, &options, runner).await
        }
        TaskAction::Smoke => cmd_smoke(settings, None).await,
        TaskAction::Clean(dir) => clean(&dir, dry_run).await,
        TaskAction::Command(command) => {
            if dry_run {
                println!("{}", command);
                return Ok(0);
            }
            info!("Running: {}", command);
            run_checked(runner, &command).await?;
            Ok(0)
        }
    }
}

async fn clean(dir: &Path, dry_run: bool) -> Result<i32, DeployError> {
    if dry_run {
        println!("would remove __pycache__ directories and *.pyc files under {}", dir.display());
        return Ok(0);
    }
    let removed = Dir::new(dir).purge("__pycache__", ".pyc").await?;
    println!("Removed {} cache entries under {}", removed, dir.display());
    Ok(0)
}
