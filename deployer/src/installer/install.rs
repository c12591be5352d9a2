//! System dependency installation

use tracing::info;

use crate::deploy::action::Plan;
use crate::deploy::executor::{Executor, RunReport};
use crate::deploy::runner::CommandRunner;
use crate::errors::DeployError;
use crate::installer::packages::PackageManager;
use crate::storage::settings::Settings;

/// Build the dependency installation plan for `manager`
pub fn build_install_plan(manager: PackageManager) -> Plan {
    let mut plan = Plan::new("install-deps");
    plan.run("refresh package index", manager.refresh_command());
    plan.run(
        "install system packages",
        manager.install_command(manager.packages()),
    );
    plan
}

/// Install the system packages the app and its proxy need
pub async fn install_deps(
    settings: &Settings,
    runner: &dyn CommandRunner,
    dry_run: bool,
) -> Result<RunReport, DeployError> {
    println!("Flask APM demo - dependency installer");
    println!("=====================================");
    println!();

    let manager = PackageManager::resolve(settings.package_manager)?;
    info!("Using package manager: {}", manager.binary());
    println!("Package manager: {}", manager.binary());
    println!("Packages: {}", manager.packages().join(" "));
    println!();

    let plan = build_install_plan(manager);
    let report = Executor::new(runner).dry_run(dry_run).apply(&plan).await?;

    println!();
    if dry_run {
        println!("[DRY RUN] {} steps planned, nothing executed.", report.steps.len());
    } else {
        println!("[SUCCESS] System dependencies installed.");
        println!("Next: apmdeploy deploy");
    }
    Ok(report)
}
