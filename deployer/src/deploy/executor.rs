//! Plan executor
//!
//! Applies a [`Plan`] strictly in order and stops at the first failing step.
//! There is no rollback: whatever earlier steps changed stays changed.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::deploy::action::{Action, Plan, Step};
use crate::deploy::runner::{run_checked, CommandRunner, CommandSpec};
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::utils::generate_uuid;

/// What happened to a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The change was made
    Applied,
    /// A file was rewritten with identical contents
    Unchanged,
    /// Nothing to do
    Skipped(String),
    /// Dry run; nothing executed
    Planned,
}

/// Per-step record
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub label: String,
    pub outcome: StepOutcome,
    pub elapsed_ms: u128,
}

/// Record of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub plan: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn outcome(&self, label: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.label == label).map(|s| &s.outcome)
    }
}

/// Plan executor
pub struct Executor<'a> {
    runner: &'a dyn CommandRunner,
    dry_run: bool,
}

impl<'a> Executor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            dry_run: false,
        }
    }

    /// Print steps instead of executing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply every step in order
    pub async fn apply(&self, plan: &Plan) -> Result<RunReport, DeployError> {
        let mut report = RunReport {
            run_id: generate_uuid(),
            plan: plan.name.clone(),
            started_at: Utc::now(),
            steps: Vec::with_capacity(plan.len()),
        };
        info!("Applying plan '{}' ({} steps, run {})", plan.name, plan.len(), report.run_id);

        let total = plan.len();
        for (index, step) in plan.steps.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, total, step.label);
            let started = Instant::now();

            let outcome = if self.dry_run {
                println!("[{}/{}] {}: {}", index + 1, total, step.label, step.action.describe());
                StepOutcome::Planned
            } else {
                match self.apply_step(step).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Step '{}' failed: {}", step.label, e);
                        return Err(DeployError::StepFailed {
                            step: step.label.clone(),
                            source: Box::new(e),
                        });
                    }
                }
            };

            debug!("Step '{}' -> {:?}", step.label, outcome);
            report.steps.push(StepReport {
                label: step.label.clone(),
                outcome,
                elapsed_ms: started.elapsed().as_millis(),
            });
        }

        info!("Plan '{}' complete", plan.name);
        Ok(report)
    }

    async fn apply_step(&self, step: &Step) -> Result<StepOutcome, DeployError> {
        match &step.action {
            Action::EnsureUser { name, home } => self.ensure_user(name, home).await,

            Action::EnsureDir { path, owner } => {
                Dir::new(path).create().await?;
                if let Some(owner) = owner {
                    self.chown(owner, path).await?;
                }
                Ok(StepOutcome::Applied)
            }

            Action::CopyTree { from, to, exclude } => {
                let stats = Dir::new(from).copy_tree(to, exclude).await?;
                info!(
                    "Copied {} files ({} directories) into {}",
                    stats.files,
                    stats.dirs,
                    to.display()
                );
                Ok(StepOutcome::Applied)
            }

            Action::WriteFile {
                path,
                contents,
                mode,
            } => {
                let file = File::new(path);
                let before = file.digest().await;
                file.write_atomic(contents.as_bytes(), *mode).await?;
                let after = crate::utils::sha256_hash(contents.as_bytes());
                if before.as_deref() == Some(after.as_str()) {
                    Ok(StepOutcome::Unchanged)
                } else {
                    Ok(StepOutcome::Applied)
                }
            }

            Action::RemoveFile { path } => {
                let file = File::new(path);
                if file.exists().await {
                    file.delete().await?;
                    Ok(StepOutcome::Applied)
                } else {
                    Ok(StepOutcome::Skipped("not present".to_string()))
                }
            }

            Action::Run(command) => {
                run_checked(self.runner, command).await?;
                Ok(StepOutcome::Applied)
            }

            Action::Sleep(duration) => {
                sleep(*duration).await;
                Ok(StepOutcome::Applied)
            }
        }
    }

    async fn ensure_user(
        &self,
        name: &str,
        home: &std::path::Path,
    ) -> Result<StepOutcome, DeployError> {
        let probe = self.runner.run(&CommandSpec::new("id").args(["-u", name])).await?;
        if probe.success() {
            info!("User {} already exists", name);
            return Ok(StepOutcome::Skipped("account exists".to_string()));
        }

        let home = home.to_string_lossy();
        let useradd = CommandSpec::new("useradd").args([
            "--system",
            "--user-group",
            "--no-create-home",
            "--home-dir",
            home.as_ref(),
            "--shell",
            "/usr/sbin/nologin",
            name,
        ]);
        run_checked(self.runner, &useradd).await?;
        info!("Created user {}", name);
        Ok(StepOutcome::Applied)
    }

    async fn chown(&self, owner: &str, path: &std::path::Path) -> Result<(), DeployError> {
        let command = CommandSpec::new("chown")
            .arg(format!("{}:{}", owner, owner))
            .arg(path.to_string_lossy());
        run_checked(self.runner, &command).await?;
        Ok(())
    }
}

async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
