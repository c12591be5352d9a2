//! `apmdeploy deploy`

use std::path::PathBuf;

use tracing::{info, warn};

use crate::deploy::executor::{Executor, RunReport};
use crate::deploy::plan::build_deploy_plan;
use crate::deploy::runner::CommandRunner;
use crate::deploy::summary::DeploymentSummary;
use crate::errors::DeployError;
use crate::storage::layout::Layout;
use crate::storage::settings::Settings;

/// Deploy options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// App source tree to install
    pub source_dir: PathBuf,

    /// Filesystem root artifacts are written under
    pub root: PathBuf,

    /// Print the plan without executing it
    pub dry_run: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            root: PathBuf::from("/"),
            dry_run: false,
        }
    }
}

/// Provision, configure and start the app; print a summary on success
pub async fn deploy(
    settings: &Settings,
    options: &DeployOptions,
    runner: &dyn CommandRunner,
) -> Result<RunReport, DeployError> {
    let source_dir = options.source_dir.canonicalize().map_err(|e| {
        DeployError::ValidationError(format!(
            "source directory {} is not usable: {}",
            options.source_dir.display(),
            e
        ))
    })?;
    let layout = Layout::new(&options.root, settings);

    println!("Deploying {} from {}", settings.app_name, source_dir.display());
    if !layout.is_live() {
        warn!("Writing artifacts under {}", layout.root.display());
    }
    if !source_dir.join("app.py").is_file() {
        warn!("No app.py in {}; the unit's entry point may not resolve", source_dir.display());
    }

    let plan = build_deploy_plan(settings, &layout, &source_dir);
    let report = Executor::new(runner)
        .dry_run(options.dry_run)
        .apply(&plan)
        .await?;

    println!();
    if options.dry_run {
        println!("[DRY RUN] {} steps planned, nothing executed.", report.steps.len());
        return Ok(report);
    }

    let summary = DeploymentSummary::gather(settings, &layout, runner).await;
    info!("Deployment finished with service status '{}'", summary.status);
    print!("{}", summary.render());
    Ok(report)
}
