//! Task shortcut tests

use std::path::Path;

use clap::ValueEnum;

use apm_deployer::app::tasks::{resolve_task, Task, TaskAction, API_KEY_VAR};
use apm_deployer::errors::DeployError;
use apm_deployer::filesys::dir::Dir;
use apm_deployer::storage::settings::Settings;

fn no_env(_: &str) -> Option<String> {
    None
}

fn command_of(action: TaskAction) -> apm_deployer::deploy::runner::CommandSpec {
    match action {
        TaskAction::Command(command) => command,
        other => panic!("expected a command, got {:?}", other),
    }
}

#[test]
fn test_task_names() {
    let names: Vec<String> = Task::value_variants()
        .iter()
        .filter_map(|t| t.to_possible_value())
        .map(|v| v.get_name().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["install", "run", "dev", "test", "docker-build", "docker-run", "deploy", "clean"]
    );
    assert_eq!(Task::from_str("docker-run", false).unwrap(), Task::DockerRun);
}

#[test]
fn test_workflow_tasks() {
    let settings = Settings::default();
    let src = Path::new("/srv/app");
    assert!(matches!(
        resolve_task(Task::Install, &settings, src, no_env).unwrap(),
        TaskAction::InstallDeps
    ));
    assert!(matches!(
        resolve_task(Task::Deploy, &settings, src, no_env).unwrap(),
        TaskAction::Deploy
    ));
    assert!(matches!(
        resolve_task(Task::Test, &settings, src, no_env).unwrap(),
        TaskAction::Smoke
    ));
    match resolve_task(Task::Clean, &settings, src, no_env).unwrap() {
        TaskAction::Clean(dir) => assert_eq!(dir, src),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_passthrough_commands() {
    let settings = Settings::default();
    let src = Path::new("/srv/app");

    let run = command_of(resolve_task(Task::Run, &settings, src, no_env).unwrap());
    assert_eq!(run.command_line(), "python3 app.py");
    assert_eq!(run.current_dir.as_deref(), Some(src));

    let dev = command_of(resolve_task(Task::Dev, &settings, src, no_env).unwrap());
    assert_eq!(dev.to_string(), "FLASK_ENV=development flask --app app run --debug --port 8000");

    let build = command_of(resolve_task(Task::DockerBuild, &settings, src, no_env).unwrap());
    assert_eq!(build.command_line(), "docker build -t flask-apm-demo .");
}

#[test]
fn test_docker_run_requires_api_key() {
    let settings = Settings::default();
    let err = resolve_task(Task::DockerRun, &settings, Path::new("."), no_env).unwrap_err();
    assert!(matches!(err, DeployError::MissingSecret(_)));

    let blank = |_: &str| Some("  ".to_string());
    let err = resolve_task(Task::DockerRun, &settings, Path::new("."), blank).unwrap_err();
    assert!(matches!(err, DeployError::MissingSecret(_)));
}

#[test]
fn test_docker_run_forwards_key_without_showing_it() {
    let lookup = |key: &str| (key == API_KEY_VAR).then(|| "abc123".to_string());
    let command = command_of(
        resolve_task(Task::DockerRun, &Settings::default(), Path::new("."), lookup).unwrap(),
    );

    assert_eq!(
        command.command_line(),
        "docker run --rm -p 8000:8000 -e DD_API_KEY flask-apm-demo"
    );
    assert_eq!(command.secret_env.len(), 1);
    assert!(!command.to_string().contains("abc123"));
    assert!(!format!("{:?}", command).contains("abc123"));
}

#[test]
fn test_clean_removes_bytecode() {
    let src = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(src.path().join("__pycache__")).unwrap();
    std::fs::write(src.path().join("__pycache__/app.cpython-312.pyc"), b"").unwrap();
    std::fs::write(src.path().join("app.py"), "").unwrap();

    let removed = tokio_test::block_on(Dir::new(src.path()).purge("__pycache__", ".pyc")).unwrap();
    assert_eq!(removed, 1);
    assert!(src.path().join("app.py").exists());
}
