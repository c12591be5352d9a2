//! Post-deploy summary

use std::net::IpAddr;
use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::deploy::runner::{CommandRunner, CommandSpec};
use crate::storage::layout::Layout;
use crate::storage::settings::Settings;

/// What gets printed after a deploy
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentSummary {
    pub service_name: String,
    pub status: String,
    pub log_dir: PathBuf,
    pub health_script: PathBuf,
    pub urls: Vec<String>,
    pub commands: Vec<String>,
}

impl DeploymentSummary {
    /// Query the unit status and guess public URLs.
    ///
    /// Lookup failures degrade to "unknown"/localhost; the deploy already
    /// succeeded by the time this runs.
    pub async fn gather(settings: &Settings, layout: &Layout, runner: &dyn CommandRunner) -> Self {
        let unit = format!("{}.service", settings.service_name);

        let status = runner
            .run(&CommandSpec::new("systemctl").args(["is-active", unit.as_str()]))
            .await
            .ok()
            .map(|out| out.stdout.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let addresses = runner
            .run(&CommandSpec::new("hostname").arg("-I"))
            .await
            .ok()
            .filter(|out| out.success())
            .map(|out| out.stdout)
            .unwrap_or_default();

        Self::new(settings, layout, status, &addresses, sysinfo::System::host_name())
    }

    /// Build a summary from already-collected facts
    pub fn new(
        settings: &Settings,
        layout: &Layout,
        status: String,
        addresses: &str,
        hostname: Option<String>,
    ) -> Self {
        let service = &settings.service_name;
        let health_script = layout.real_health_script();

        Self {
            service_name: service.clone(),
            status,
            log_dir: settings.log_dir.clone(),
            urls: guess_urls(addresses, hostname.as_deref()),
            commands: vec![
                format!("systemctl status {}", service),
                format!("journalctl -u {} -f", service),
                format!("tail -f {}", settings.app_log_file().display()),
                format!("systemctl restart {}", service),
                health_script.display().to_string(),
            ],
            health_script,
        }
    }

    /// Human-readable text block
    pub fn render(&self) -> String {
        let status = match self.status.as_str() {
            "active" => self.status.green().to_string(),
            "unknown" | "activating" | "reloading" => self.status.yellow().to_string(),
            _ => self.status.red().to_string(),
        };

        let mut out = String::new();
        out.push_str(&format!("{}\n", "Deployment complete".bold()));
        out.push_str("===================\n");
        out.push_str(&format!("Service:       {}\n", self.service_name));
        out.push_str(&format!("Status:        {}\n", status));
        out.push_str(&format!("Logs:          {}\n", self.log_dir.display()));
        out.push_str(&format!("Health check:  {}\n", self.health_script.display()));
        out.push_str("\nApplication URLs:\n");
        for url in &self.urls {
            out.push_str(&format!("  {}\n", url));
        }
        out.push_str("\nUseful commands:\n");
        for command in &self.commands {
            out.push_str(&format!("  {}\n", command));
        }
        out
    }
}

/// URLs the app is probably reachable at through the proxy
fn guess_urls(addresses: &str, hostname: Option<&str>) -> Vec<String> {
    let mut urls: Vec<String> = addresses
        .split_whitespace()
        .filter_map(|a| a.parse::<IpAddr>().ok())
        .filter(|ip| !ip.is_loopback())
        .map(|ip| match ip {
            IpAddr::V4(v4) => format!("http://{}/", v4),
            IpAddr::V6(v6) => format!("http://[{}]/", v6),
        })
        .collect();

    if let Some(host) = hostname.filter(|h| !h.is_empty()) {
        urls.push(format!("http://{}/", host));
    }
    if urls.is_empty() {
        urls.push("http://localhost/".to_string());
    }
    urls
}
