//! Health probe and smoke batch tests against a local axum app

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use apm_deployer::errors::DeployError;
use apm_deployer::health::probe::probe;
use apm_deployer::health::smoke::{run_smoke, LogCheck, SmokeOptions};
use apm_deployer::render::probe_script::render_script;
use apm_deployer::storage::settings::Settings;

async fn spawn_app(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn demo_app() -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route("/api/fast", get(|| async { Json(json!({"message": "Fast response!"})) }))
        .route(
            "/api/error-random",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Internal Server Error - Simulated server error"})),
                )
            }),
        )
}

/// An address nothing is listening on
async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_probe_healthy() {
    let addr = spawn_app(demo_app()).await;
    let outcome = probe("flask-app", &format!("http://{}/health", addr), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(outcome.healthy);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.message, "OK: flask-app is healthy");
}

#[tokio::test]
async fn test_probe_unhealthy_status() {
    let app = Router::new().route(
        "/health",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "draining") }),
    );
    let addr = spawn_app(app).await;
    let outcome = probe("flask-app", &format!("http://{}/health", addr), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(!outcome.healthy);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.message, "CRITICAL: flask-app health check failed (HTTP 503)");
}

#[tokio::test]
async fn test_probe_app_stopped() {
    let addr = closed_port().await;
    let outcome = probe("flask-app", &format!("http://{}/health", addr), Duration::from_secs(2))
        .await
        .unwrap();

    assert!(!outcome.healthy);
    assert_eq!(outcome.exit_code(), 1);
    assert!(outcome.message.starts_with("CRITICAL: flask-app health check failed"));
    assert!(outcome.status.is_none());
}

#[tokio::test]
async fn test_probe_timeout() {
    let app = Router::new().route(
        "/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "late"
        }),
    );
    let addr = spawn_app(app).await;
    let outcome = probe("flask-app", &format!("http://{}/health", addr), Duration::from_millis(200))
        .await
        .unwrap();

    assert!(!outcome.healthy);
    assert!(outcome.message.contains("timed out"));
}

fn fast_options(addr: SocketAddr, log_file: std::path::PathBuf) -> SmokeOptions {
    SmokeOptions {
        base_url: format!("http://{}", addr),
        endpoints: vec![
            "/api/fast".to_string(),
            "/api/error-random".to_string(),
            "/api/missing".to_string(),
            "/health".to_string(),
        ],
        load_endpoints: vec!["/api/fast".to_string(), "/api/error-random".to_string()],
        load_requests: 4,
        probe_pause: Duration::ZERO,
        load_pause: Duration::ZERO,
        log_file,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_smoke_counts_failures_without_aborting() {
    let addr = spawn_app(demo_app()).await;
    let logs = tempfile::tempdir().unwrap();
    let log_file = logs.path().join("app.log");
    std::fs::write(
        &log_file,
        "{\"levelname\": \"INFO\", \"message\": \"Health check called\"}\n",
    )
    .unwrap();

    let report = run_smoke(&fast_options(addr, log_file)).await.unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.successful(), 2);
    let codes: Vec<Option<u16>> = report.endpoints.iter().map(|r| r.status_code).collect();
    assert_eq!(codes, vec![Some(200), Some(500), Some(404), Some(200)]);

    assert_eq!(report.load.len(), 4);
    assert_eq!(report.load.iter().filter(|r| r.success).count(), 2);

    match report.log_check {
        LogCheck::Entries {
            total_lines,
            valid_json_in_tail,
            ..
        } => {
            assert_eq!(total_lines, 1);
            assert_eq!(valid_json_in_tail, 1);
        }
        other => panic!("unexpected log check {:?}", other),
    }
}

#[tokio::test]
async fn test_smoke_missing_log_is_reported() {
    let addr = spawn_app(demo_app()).await;
    let logs = tempfile::tempdir().unwrap();

    let report = run_smoke(&fast_options(addr, logs.path().join("app.log")))
        .await
        .unwrap();
    assert!(matches!(report.log_check, LogCheck::Missing));
}

#[tokio::test]
async fn test_smoke_unreachable_app_fails() {
    let addr = closed_port().await;
    let logs = tempfile::tempdir().unwrap();

    let err = run_smoke(&fast_options(addr, logs.path().join("app.log")))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ValidationError(_)));
}

/// Run the rendered health-check script for an app on `port`
#[cfg(unix)]
async fn run_health_script(port: u16, path: &str) -> (Option<i32>, String) {
    let mut settings = Settings::default();
    settings.app_port = port;
    let script = render_script(&settings).replace("/health", path);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("flask-app-health");
    std::fs::write(&file, script).unwrap();

    let output = tokio::process::Command::new("sh")
        .arg(&file)
        .output()
        .await
        .unwrap();
    (
        output.status.code(),
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    )
}

#[cfg(unix)]
fn curl_available() -> bool {
    std::process::Command::new("curl")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(unix)]
#[tokio::test]
async fn test_health_script_agrees_with_probe() {
    if !curl_available() {
        eprintln!("curl not installed, skipping");
        return;
    }

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/down",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "draining") }),
        )
        .route("/moved", get(|| async { Redirect::temporary("/health") }))
        .route("/moved-down", get(|| async { Redirect::temporary("/down") }));
    let addr = spawn_app(app).await;

    for (path, healthy) in [
        ("/health", true),
        ("/down", false),
        ("/moved", true),
        ("/moved-down", false),
    ] {
        let outcome = probe(
            "flask-app",
            &format!("http://{}{}", addr, path),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome.healthy, healthy, "probe verdict for {}", path);

        let (code, stdout) = run_health_script(addr.port(), path).await;
        if healthy {
            assert_eq!(code, Some(0), "script exit for {}", path);
            assert_eq!(stdout, "OK: flask-app is healthy");
        } else {
            assert_eq!(code, Some(1), "script exit for {}", path);
            assert_eq!(stdout, "CRITICAL: flask-app health check failed (HTTP 503)");
        }
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_health_script_app_stopped() {
    if !curl_available() {
        eprintln!("curl not installed, skipping");
        return;
    }

    let addr = closed_port().await;
    let (code, stdout) = run_health_script(addr.port(), "/health").await;
    assert_eq!(code, Some(1));
    assert_eq!(
        stdout,
        "CRITICAL: flask-app health check failed (health endpoint did not answer)"
    );
}
