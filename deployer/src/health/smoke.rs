//! Smoke test batch for the demo endpoints
//!
//! Exercises every demo endpoint once, generates a little extra load, then
//! checks the app's JSON log. Individual failures are reported and counted;
//! only an unreachable app stops the batch.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use colored::Colorize;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Endpoints probed once each, in order
pub const DEMO_ENDPOINTS: &[&str] = &[
    "/api/fast",
    "/api/slow",
    "/api/memory-intensive",
    "/api/cpu-intensive",
    "/api/error-random",
    "/api/external-call",
    "/api/database-simulation",
    "/api/chain-calls",
    "/api/crash-test",
    "/api/security-error",
    "/health",
    "/api/stats",
];

/// Endpoints cycled through by the load phase
pub const LOAD_ENDPOINTS: &[&str] = &["/api/fast", "/api/error-random", "/api/crash-test"];

/// Log lines (from the end) checked for JSON
const LOG_TAIL_LINES: usize = 5;

/// Smoke batch options
#[derive(Debug, Clone)]
pub struct SmokeOptions {
    /// Base URL of the app, without trailing slash
    pub base_url: String,

    /// Endpoints probed once each
    pub endpoints: Vec<String>,

    /// Endpoints cycled through by the load phase
    pub load_endpoints: Vec<String>,

    /// Number of load requests
    pub load_requests: usize,

    /// Timeout of the initial reachability check
    pub reachability_timeout: Duration,

    /// Timeout per endpoint probe
    pub probe_timeout: Duration,

    /// Timeout per load request
    pub load_timeout: Duration,

    /// Pause between endpoint probes
    pub probe_pause: Duration,

    /// Pause between load requests
    pub load_pause: Duration,

    /// App log file to inspect
    pub log_file: PathBuf,
}

impl Default for SmokeOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoints: DEMO_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            load_endpoints: LOAD_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            load_requests: 10,
            reachability_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(30),
            load_timeout: Duration::from_secs(10),
            probe_pause: Duration::from_millis(500),
            load_pause: Duration::from_millis(200),
            log_file: PathBuf::from("/var/log/flask-app/app.log"),
        }
    }
}

/// Outcome of one request
#[derive(Debug, Clone, Serialize)]
pub struct EndpointResult {
    pub endpoint: String,
    pub status_code: Option<u16>,
    pub elapsed_ms: u128,
    pub error: Option<String>,
    pub success: bool,
}

/// What the log inspection found
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LogCheck {
    Missing,
    Empty,
    Unreadable { reason: String },
    Entries {
        total_lines: usize,
        valid_json_in_tail: usize,
        sample: Option<serde_json::Value>,
    },
}

/// Full batch report
#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub endpoints: Vec<EndpointResult>,
    pub load: Vec<EndpointResult>,
    pub log_check: LogCheck,
}

impl SmokeReport {
    pub fn successful(&self) -> usize {
        self.endpoints.iter().filter(|r| r.success).count()
    }

    pub fn total(&self) -> usize {
        self.endpoints.len()
    }
}

/// Run the batch. Fails only when the app does not answer `/health`.
pub async fn run_smoke(options: &SmokeOptions) -> Result<SmokeReport, DeployError> {
    let base = options.base_url.trim_end_matches('/');
    let client = Client::builder().build()?;

    println!("{}", "Flask APM demo smoke test".bold());
    println!("{}", "=".repeat(50));

    let health = request(&client, base, "/health", options.reachability_timeout).await;
    match health.status_code {
        Some(200) => println!("{} Application is running", "OK".green()),
        Some(code) => println!("{} Application returned status {}", "WARN".yellow(), code),
        None => {
            println!("{} Application is not reachable at {}", "FAILED".red(), base);
            println!("   Start it first, e.g. `apmdeploy task run`");
            return Err(DeployError::ValidationError(format!(
                "application not reachable at {}",
                base
            )));
        }
    }

    println!();
    println!("Testing endpoints...");
    println!("{}", "-".repeat(50));
    let mut endpoints = Vec::with_capacity(options.endpoints.len());
    for endpoint in &options.endpoints {
        let result = request(&client, base, endpoint, options.probe_timeout).await;
        print_result(&result);
        endpoints.push(result);
        tokio::time::sleep(options.probe_pause).await;
    }

    println!();
    println!("Generating test load...");
    println!("{}", "-".repeat(25));
    let mut load = Vec::with_capacity(options.load_requests);
    if !options.load_endpoints.is_empty() {
        for i in 0..options.load_requests {
            let endpoint = &options.load_endpoints[i % options.load_endpoints.len()];
            let result = request(&client, base, endpoint, options.load_timeout).await;
            let mark = if result.success { "ok".green() } else { "err".red() };
            match result.status_code {
                Some(code) => println!("  {} request {}: {} -> {}", mark, i + 1, endpoint, code),
                None => println!(
                    "  {} request {}: {} -> {}",
                    mark,
                    i + 1,
                    endpoint,
                    result.error.as_deref().unwrap_or("error")
                ),
            }
            load.push(result);
            tokio::time::sleep(options.load_pause).await;
        }
    }

    println!();
    println!("Checking JSON log file...");
    println!("{}", "-".repeat(30));
    let log_check = inspect_log(&options.log_file).await;
    print_log_check(&log_check, &options.log_file);

    let report = SmokeReport {
        endpoints,
        load,
        log_check,
    };

    println!();
    println!("{}", "Summary".bold());
    println!("{}", "=".repeat(20));
    println!("Successful tests: {}/{}", report.successful(), report.total());
    println!(
        "Error responses (expected for the error demos): {}/{}",
        report.total() - report.successful(),
        report.total()
    );

    Ok(report)
}

async fn request(client: &Client, base: &str, endpoint: &str, timeout: Duration) -> EndpointResult {
    let url = format!("{}{}", base, endpoint);
    debug!("GET {}", url);
    let started = Instant::now();

    match client.get(&url).timeout(timeout).send().await {
        Ok(response) => {
            let code = response.status().as_u16();
            // Drain the body so timing covers the full response
            let _ = response.bytes().await;
            EndpointResult {
                endpoint: endpoint.to_string(),
                status_code: Some(code),
                elapsed_ms: started.elapsed().as_millis(),
                error: None,
                success: code < 400,
            }
        }
        Err(e) => {
            warn!("Request to {} failed: {}", url, e);
            EndpointResult {
                endpoint: endpoint.to_string(),
                status_code: None,
                elapsed_ms: started.elapsed().as_millis(),
                error: Some(e.to_string()),
                success: false,
            }
        }
    }
}

fn print_result(result: &EndpointResult) {
    match result.status_code {
        Some(code) => {
            let mark = if result.success {
                "SUCCESS".green()
            } else {
                "ERROR".yellow()
            };
            println!(
                "  {} {} - status {}, {:.3}s",
                mark,
                result.endpoint,
                code,
                result.elapsed_ms as f64 / 1000.0
            );
        }
        None => println!(
            "  {} {} - {}",
            "FAILED".red(),
            result.endpoint,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Count log lines and check the tail parses as JSON
pub async fn inspect_log(path: &std::path::Path) -> LogCheck {
    let file = File::new(path);
    if !file.exists().await {
        return LogCheck::Missing;
    }
    let contents = match file.read_string().await {
        Ok(contents) => contents,
        Err(e) => {
            return LogCheck::Unreadable {
                reason: e.to_string(),
            }
        }
    };

    let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return LogCheck::Empty;
    }

    let tail_start = lines.len().saturating_sub(LOG_TAIL_LINES);
    let valid_json_in_tail = lines[tail_start..]
        .iter()
        .filter(|l| serde_json::from_str::<serde_json::Value>(l.trim()).is_ok())
        .count();

    let sample = lines
        .iter()
        .rev()
        .find_map(|l| serde_json::from_str::<serde_json::Value>(l.trim()).ok());

    LogCheck::Entries {
        total_lines: lines.len(),
        valid_json_in_tail,
        sample,
    }
}

fn print_log_check(check: &LogCheck, path: &std::path::Path) {
    match check {
        LogCheck::Missing => {
            println!("{} Log file not found: {}", "WARN".yellow(), path.display());
            println!("   The app user needs write access to the log directory.");
        }
        LogCheck::Empty => println!("{} Log file is empty", "WARN".yellow()),
        LogCheck::Unreadable { reason } => {
            println!("{} Error reading log file: {}", "FAILED".red(), reason)
        }
        LogCheck::Entries {
            total_lines,
            valid_json_in_tail,
            sample,
        } => {
            println!("{} Log file has {} entries", "OK".green(), total_lines);
            if *valid_json_in_tail > 0 {
                println!(
                    "{} {} valid JSON entries in the last {} lines",
                    "OK".green(),
                    valid_json_in_tail,
                    LOG_TAIL_LINES
                );
            } else {
                println!("{} No valid JSON entries in recent logs", "WARN".yellow());
            }
            if let Some(sample) = sample {
                if let Ok(pretty) = serde_json::to_string_pretty(sample) {
                    println!();
                    println!("Sample entry:");
                    println!("{}", pretty);
                }
            }
        }
    }
}
