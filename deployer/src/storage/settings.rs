//! Deployer settings
//!
//! Every field has a default matching the stock Flask APM demo install, so an
//! empty `{}` settings file (or no file at all) deploys the demo as-is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::installer::packages::PackageManagerChoice;
use crate::logs::LogLevel;

/// Unit environment derived from the monitoring settings and the venv
pub const MANAGED_ENV: &[&str] = &[
    "DD_SERVICE",
    "DD_ENV",
    "DD_VERSION",
    "DD_LOGS_INJECTION",
    "PATH",
];

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application name; used for the nginx site, logrotate rule and probe script
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Unprivileged account that owns and runs the app
    #[serde(default = "default_app_name")]
    pub service_user: String,

    /// systemd unit name (without `.service`)
    #[serde(default = "default_app_name")]
    pub service_name: String,

    /// Install directory
    #[serde(default = "default_app_dir")]
    pub app_dir: PathBuf,

    /// Log directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Local port the app listens on
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    /// WSGI entry point handed to gunicorn
    #[serde(default = "default_wsgi_app")]
    pub wsgi_app: String,

    /// Gunicorn worker count
    #[serde(default = "default_workers")]
    pub workers: u16,

    /// Monitoring agent tags
    #[serde(default)]
    pub monitoring: MonitoringSettings,

    /// Extra environment for the supervised process
    #[serde(default)]
    pub extra_env: BTreeMap<String, String>,

    /// Docker image name used by the docker tasks
    #[serde(default = "default_docker_image")]
    pub docker_image: String,

    /// Seconds to wait after starting services before verifying them
    #[serde(default = "default_post_deploy_delay")]
    pub post_deploy_delay_secs: u64,

    /// Package manager to use for dependency installation
    #[serde(default)]
    pub package_manager: PackageManagerChoice,

    /// Source entries never copied into the install directory
    #[serde(default = "default_copy_exclude")]
    pub copy_exclude: Vec<String>,
}

fn default_app_name() -> String {
    "flask-app".to_string()
}

fn default_app_dir() -> PathBuf {
    PathBuf::from("/opt/flask-app")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/flask-app")
}

fn default_app_port() -> u16 {
    8000
}

fn default_wsgi_app() -> String {
    "app:app".to_string()
}

fn default_workers() -> u16 {
    2
}

fn default_docker_image() -> String {
    "flask-apm-demo".to_string()
}

fn default_post_deploy_delay() -> u64 {
    5
}

fn default_copy_exclude() -> Vec<String> {
    [".git", "target", "__pycache__", "venv", ".venv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            app_name: default_app_name(),
            service_user: default_app_name(),
            service_name: default_app_name(),
            app_dir: default_app_dir(),
            log_dir: default_log_dir(),
            app_port: default_app_port(),
            wsgi_app: default_wsgi_app(),
            workers: default_workers(),
            monitoring: MonitoringSettings::default(),
            extra_env: BTreeMap::new(),
            docker_image: default_docker_image(),
            post_deploy_delay_secs: default_post_deploy_delay(),
            package_manager: PackageManagerChoice::default(),
            copy_exclude: default_copy_exclude(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, or defaults when no path is given
    pub async fn load(path: Option<&Path>) -> Result<Self, DeployError> {
        let settings = match path {
            Some(path) => {
                let file = File::new(path);
                if !file.exists().await {
                    return Err(DeployError::ConfigError(format!(
                        "settings file not found: {}",
                        path.display()
                    )));
                }
                file.read_json::<Settings>().await?
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings are usable before any plan is built
    pub fn validate(&self) -> Result<(), DeployError> {
        for (field, value) in [
            ("app_name", &self.app_name),
            ("service_user", &self.service_user),
            ("service_name", &self.service_name),
        ] {
            if !is_identifier(value) {
                return Err(DeployError::ValidationError(format!(
                    "{} must be non-empty and contain only [A-Za-z0-9._-], got {:?}",
                    field, value
                )));
            }
        }

        for (field, path) in [("app_dir", &self.app_dir), ("log_dir", &self.log_dir)] {
            if !path.is_absolute() {
                return Err(DeployError::ValidationError(format!(
                    "{} must be an absolute path, got {}",
                    field,
                    path.display()
                )));
            }
            // Rendered units and the executor must agree on the exact path
            let text = path.to_string_lossy();
            if text.split('/').any(|part| part == "." || part == "..") {
                return Err(DeployError::ValidationError(format!(
                    "{} must not contain '.' or '..' components, got {}",
                    field, text
                )));
            }
            if !is_config_word(&text) {
                return Err(DeployError::ValidationError(format!(
                    "{} must not contain whitespace, control or quoting characters, got {:?}",
                    field, text
                )));
            }
        }

        let wsgi_valid = self.wsgi_app.contains(':')
            && self
                .wsgi_app
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '(' | ')'));
        if !wsgi_valid {
            return Err(DeployError::ValidationError(format!(
                "wsgi_app must look like module:callable, got {:?}",
                self.wsgi_app
            )));
        }

        if self.app_port == 0 {
            return Err(DeployError::ValidationError("app_port must be non-zero".to_string()));
        }
        if self.workers == 0 {
            return Err(DeployError::ValidationError("workers must be non-zero".to_string()));
        }

        for key in self.extra_env.keys() {
            let valid = !key.is_empty()
                && !key.starts_with(|c: char| c.is_ascii_digit())
                && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(DeployError::ValidationError(format!(
                    "invalid environment variable name: {:?}",
                    key
                )));
            }
            if MANAGED_ENV.contains(&key.as_str()) {
                return Err(DeployError::ValidationError(format!(
                    "{} is set from the monitoring settings and cannot be overridden in extra_env",
                    key
                )));
            }
        }

        Ok(())
    }

    /// URL of the app's health endpoint on the local interface
    pub fn local_health_url(&self) -> String {
        format!("http://127.0.0.1:{}/health", self.app_port)
    }

    /// Path of the app's main log file
    pub fn app_log_file(&self) -> PathBuf {
        self.log_dir.join("app.log")
    }
}

/// Characters that break a systemd `ExecStart` or an nginx directive
fn is_config_word(value: &str) -> bool {
    !value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "\"'\\;%$".contains(c))
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Monitoring agent settings, exported to the app as `DD_*` variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// `DD_SERVICE`
    #[serde(default = "default_monitoring_service")]
    pub service: String,

    /// `DD_ENV`
    #[serde(default = "default_monitoring_env")]
    pub env: String,

    /// `DD_VERSION`
    #[serde(default = "default_monitoring_version")]
    pub version: String,

    /// Inject trace ids into log records
    #[serde(default = "default_true")]
    pub logs_injection: bool,
}

fn default_monitoring_service() -> String {
    "flask-apm-demo".to_string()
}

fn default_monitoring_env() -> String {
    "production".to_string()
}

fn default_monitoring_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            service: default_monitoring_service(),
            env: default_monitoring_env(),
            version: default_monitoring_version(),
            logs_injection: true,
        }
    }
}
