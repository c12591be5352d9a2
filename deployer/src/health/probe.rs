//! Single-shot health probe

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::errors::DeployError;

/// Timeout used by the installed probe script and `apmdeploy probe`
pub const PROBE_TIMEOUT_SECS: u64 = 5;

pub fn ok_message(name: &str) -> String {
    format!("OK: {} is healthy", name)
}

pub fn critical_message(name: &str, reason: &str) -> String {
    format!("CRITICAL: {} health check failed ({})", name, reason)
}

/// Result of one probe
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub message: String,
    pub status: Option<u16>,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    /// 0 when healthy, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.healthy {
            0
        } else {
            1
        }
    }
}

/// GET `url` once and classify the answer.
///
/// Any 2xx is healthy. Connection errors, timeouts and non-2xx answers are
/// all CRITICAL; only a malformed URL is an error.
pub async fn probe(name: &str, url: &str, timeout: Duration) -> Result<ProbeOutcome, DeployError> {
    let url = Url::parse(url)?;
    let client = Client::builder().timeout(timeout).build()?;

    debug!("Probing {}", url);
    let started = Instant::now();
    let outcome = match client.get(url).send().await {
        Ok(response) if response.status().is_success() => ProbeOutcome {
            healthy: true,
            message: ok_message(name),
            status: Some(response.status().as_u16()),
            elapsed: started.elapsed(),
        },
        Ok(response) => {
            let status = response.status();
            ProbeOutcome {
                healthy: false,
                message: critical_message(name, &format!("HTTP {}", status.as_u16())),
                status: Some(status.as_u16()),
                elapsed: started.elapsed(),
            }
        }
        Err(e) => {
            let reason = if e.is_timeout() {
                format!("timed out after {:?}", timeout)
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                e.to_string()
            };
            ProbeOutcome {
                healthy: false,
                message: critical_message(name, &reason),
                status: None,
                elapsed: started.elapsed(),
            }
        }
    };

    Ok(outcome)
}
