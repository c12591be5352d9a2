//! systemd unit generation

use std::collections::BTreeMap;

use crate::storage::layout::Layout;
use crate::storage::settings::Settings;

/// Seconds systemd waits before restarting the app
pub const RESTART_SEC: u32 = 5;

/// Environment exported to the supervised process, sorted by name.
///
/// `extra_env` never shadows a managed key; `Settings::validate` rejects those.
pub fn unit_environment(settings: &Settings, layout: &Layout) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("DD_SERVICE".to_string(), settings.monitoring.service.clone());
    env.insert("DD_ENV".to_string(), settings.monitoring.env.clone());
    env.insert("DD_VERSION".to_string(), settings.monitoring.version.clone());
    if settings.monitoring.logs_injection {
        env.insert("DD_LOGS_INJECTION".to_string(), "true".to_string());
    }
    env.insert(
        "PATH".to_string(),
        format!(
            "{}/bin:/usr/local/bin:/usr/bin:/bin",
            layout.real_venv_dir().display()
        ),
    );
    for (key, value) in &settings.extra_env {
        env.entry(key.clone()).or_insert_with(|| value.clone());
    }
    env
}

/// Generate the service unit for the app.
///
/// gunicorn runs under `ddtrace-run` so the monitoring agent sees traces;
/// `ExecReload` sends HUP, which gunicorn treats as "reopen logs and
/// reload workers" and is what the logrotate hook relies on.
pub fn render_unit(settings: &Settings, layout: &Layout) -> String {
    let venv_bin = layout.real_venv_dir().join("bin");
    let log_dir = settings.log_dir.display();

    let environment: String = unit_environment(settings, layout)
        .iter()
        .map(|(k, v)| format!("Environment=\"{}={}\"\n", k, escape_value(v)))
        .collect();

    format!(
        r#"[Unit]
Description=Flask APM demo ({name})
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
User={user}
Group={user}
WorkingDirectory={app_dir}
{environment}ExecStart={venv_bin}/ddtrace-run {venv_bin}/gunicorn --workers {workers} --bind 127.0.0.1:{port} --access-logfile {log_dir}/access.log --error-logfile {log_dir}/error.log {wsgi}
ExecReload=/bin/kill -s HUP $MAINPID
Restart=always
RestartSec={restart_sec}
StandardOutput=append:{log_dir}/app.log
StandardError=append:{log_dir}/app.log

[Install]
WantedBy=multi-user.target
"#,
        name = settings.service_name,
        user = settings.service_user,
        app_dir = settings.app_dir.display(),
        environment = environment,
        venv_bin = venv_bin.display(),
        workers = settings.workers,
        port = settings.app_port,
        log_dir = log_dir,
        wsgi = settings.wsgi_app,
        restart_sec = RESTART_SEC,
    )
}

/// Escape a value for a double-quoted `Environment=` assignment
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '%' => out.push_str("%%"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
