//! Executor and deploy plan tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use apm_deployer::deploy::action::{Action, Plan};
use apm_deployer::deploy::executor::{Executor, StepOutcome};
use apm_deployer::deploy::plan::build_deploy_plan;
use apm_deployer::deploy::run::{deploy, DeployOptions};
use apm_deployer::deploy::runner::{CommandOutput, CommandRunner, CommandSpec};
use apm_deployer::errors::DeployError;
use apm_deployer::storage::layout::Layout;
use apm_deployer::storage::settings::Settings;

/// Records every command line; answers from a table of prefixes
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    responses: Vec<(String, CommandOutput)>,
}

impl RecordingRunner {
    fn respond(mut self, prefix: &str, code: i32, stdout: &str) -> Self {
        self.responses.push((
            prefix.to_string(),
            CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: if code == 0 {
                    String::new()
                } else {
                    format!("{} failed", prefix)
                },
            },
        ));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, DeployError> {
        let line = command.command_line();
        self.calls.lock().unwrap().push(line.clone());
        for (prefix, output) in &self.responses {
            if line.starts_with(prefix.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(CommandOutput {
            code: Some(0),
            ..Default::default()
        })
    }
}

fn test_settings() -> Settings {
    Settings {
        post_deploy_delay_secs: 0,
        ..Default::default()
    }
}

fn source_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.py"), "from flask import Flask\n").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "flask\nddtrace\n").unwrap();
    std::fs::create_dir_all(dir.path().join("static")).unwrap();
    std::fs::write(dir.path().join("static/style.css"), "body {}\n").unwrap();
    std::fs::create_dir_all(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    dir
}

fn staged(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

#[tokio::test]
async fn test_deploy_writes_all_artifacts() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let layout = Layout::new(root.path(), &settings);
    let runner = RecordingRunner::default();

    let default_site = staged(root.path(), "/etc/nginx/sites-enabled/default");
    std::fs::create_dir_all(default_site.parent().unwrap()).unwrap();
    std::fs::write(&default_site, "server {}").unwrap();

    let plan = build_deploy_plan(&settings, &layout, src.path());
    let report = Executor::new(&runner).apply(&plan).await.unwrap();
    assert_eq!(report.steps.len(), plan.len());

    for path in [
        "/etc/systemd/system/flask-app.service",
        "/etc/nginx/conf.d/flask-app.conf",
        "/etc/logrotate.d/flask-app",
        "/usr/local/bin/flask-app-health",
        "/opt/flask-app/app.py",
        "/opt/flask-app/static/style.css",
    ] {
        assert!(staged(root.path(), path).is_file(), "missing {}", path);
    }
    assert!(staged(root.path(), "/var/log/flask-app").is_dir());
    assert!(!staged(root.path(), "/opt/flask-app/.git").exists());
    assert!(!default_site.exists());

    let venv = staged(root.path(), "/opt/flask-app/venv");
    let requirements = staged(root.path(), "/opt/flask-app/requirements.txt");
    assert!(runner.called(&format!(
        "{}/bin/pip install -r {} gunicorn ddtrace",
        venv.display(),
        requirements.display()
    )));
}

#[tokio::test]
async fn test_command_order() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let runner = RecordingRunner::default();

    let plan = build_deploy_plan(&settings, &Layout::new(root.path(), &settings), src.path());
    Executor::new(&runner).apply(&plan).await.unwrap();

    let calls = runner.calls();
    let position = |needle: &str| {
        calls
            .iter()
            .position(|c| c == needle)
            .unwrap_or_else(|| panic!("{} not run; calls: {:#?}", needle, calls))
    };

    assert_eq!(calls[0], "id -u flask-app");
    let ordered = [
        "systemctl enable --now firewalld",
        "firewall-cmd --permanent --add-service=http",
        "firewall-cmd --permanent --add-service=https",
        "firewall-cmd --reload",
        "systemctl daemon-reload",
        "systemctl enable flask-app.service",
        "systemctl restart flask-app.service",
        "systemctl restart nginx",
        "systemctl status flask-app.service --no-pager",
    ];
    for pair in ordered.windows(2) {
        assert!(
            position(pair[0]) < position(pair[1]),
            "{} ran after {}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(calls.last().unwrap(), "nginx -t");
}

#[tokio::test]
async fn test_existing_account_is_not_recreated() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let runner = RecordingRunner::default();

    let plan = build_deploy_plan(&settings, &Layout::new(root.path(), &settings), src.path());
    let report = Executor::new(&runner).apply(&plan).await.unwrap();

    assert!(!runner.called("useradd"));
    assert_eq!(
        report.outcome("ensure service account"),
        Some(&StepOutcome::Skipped("account exists".to_string()))
    );
}

#[tokio::test]
async fn test_missing_account_is_created() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let runner = RecordingRunner::default().respond("id -u", 1, "");

    let plan = build_deploy_plan(&settings, &Layout::new(root.path(), &settings), src.path());
    let report = Executor::new(&runner).apply(&plan).await.unwrap();

    assert!(runner.called(
        "useradd --system --user-group --no-create-home --home-dir /opt/flask-app --shell /usr/sbin/nologin flask-app"
    ));
    assert_eq!(report.outcome("ensure service account"), Some(&StepOutcome::Applied));
}

#[tokio::test]
async fn test_first_failure_aborts_run() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let runner = RecordingRunner::default().respond("firewall-cmd --reload", 4, "");

    let plan = build_deploy_plan(&settings, &Layout::new(root.path(), &settings), src.path());
    let err = Executor::new(&runner).apply(&plan).await.unwrap_err();

    match &err {
        DeployError::StepFailed { step, source } => {
            assert_eq!(step, "reload firewall");
            assert!(matches!(**source, DeployError::CommandFailed { code: 4, .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.exit_code(), 4);

    // nothing after the failing step ran
    assert!(!runner.called("systemctl daemon-reload"));
    assert!(!staged(root.path(), "/etc/logrotate.d/flask-app").exists());
    // earlier steps stay applied
    assert!(staged(root.path(), "/etc/systemd/system/flask-app.service").exists());
}

#[tokio::test]
async fn test_rerun_rewrites_identical_files() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let layout = Layout::new(root.path(), &settings);
    let runner = RecordingRunner::default();

    let plan = build_deploy_plan(&settings, &layout, src.path());
    let first = Executor::new(&runner).apply(&plan).await.unwrap();
    let second = Executor::new(&runner).apply(&plan).await.unwrap();

    assert_eq!(first.outcome("install systemd unit"), Some(&StepOutcome::Applied));
    assert_eq!(second.outcome("install systemd unit"), Some(&StepOutcome::Unchanged));
    assert_eq!(second.outcome("restart flask-app.service"), Some(&StepOutcome::Applied));
    assert_eq!(
        runner
            .calls()
            .iter()
            .filter(|c| c.as_str() == "systemctl restart flask-app.service")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let runner = RecordingRunner::default();

    let plan = build_deploy_plan(&settings, &Layout::new(root.path(), &settings), src.path());
    let report = Executor::new(&runner).dry_run(true).apply(&plan).await.unwrap();

    assert!(runner.calls().is_empty());
    assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Planned));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_remove_missing_file_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::default();
    let mut plan = Plan::new("cleanup");
    plan.push(
        "remove stale file",
        Action::RemoveFile {
            path: root.path().join("absent.conf"),
        },
    );

    let report = Executor::new(&runner).apply(&plan).await.unwrap();
    assert!(matches!(
        report.outcome("remove stale file"),
        Some(StepOutcome::Skipped(_))
    ));
}

#[tokio::test]
async fn test_deploy_workflow_gathers_summary() {
    let root = tempfile::tempdir().unwrap();
    let src = source_tree();
    let settings = test_settings();
    let runner = RecordingRunner::default()
        .respond("systemctl is-active", 0, "active\n")
        .respond("hostname -I", 0, "10.1.2.3\n");

    let options = DeployOptions {
        source_dir: src.path().to_path_buf(),
        root: root.path().to_path_buf(),
        dry_run: false,
    };
    let report = deploy(&settings, &options, &runner).await.unwrap();

    assert_eq!(report.plan, "deploy");
    assert!(runner.called("systemctl is-active flask-app.service"));
    assert!(runner.called("hostname -I"));
}

#[tokio::test]
async fn test_deploy_rejects_missing_source() {
    let root = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::default();
    let options = DeployOptions {
        source_dir: root.path().join("does-not-exist"),
        root: root.path().to_path_buf(),
        dry_run: false,
    };

    let err = deploy(&test_settings(), &options, &runner).await.unwrap_err();
    assert!(matches!(err, DeployError::ValidationError(_)));
    assert!(runner.calls().is_empty());
}
