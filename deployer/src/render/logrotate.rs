//! logrotate policy generation

use crate::storage::settings::Settings;

/// Rotated generations kept
pub const RETAINED_GENERATIONS: u32 = 30;

/// Files whose writers reopen them: gunicorn on HUP, `apmdeploy` on every run
pub const REOPENED_LOGS: &[&str] = &["access.log", "error.log", "deploy.log"];

/// Written by systemd through `StandardOutput=append:`; the unit keeps the
/// descriptor for its whole lifetime
pub const CAPTURED_LOG: &str = "app.log";

/// Generate the logrotate rule for the app's log directory.
///
/// Rotation is daily for every file. `app.log` is copied then truncated in
/// place since systemd never reopens it. The files gunicorn owns are renamed
/// and recreated, and the `postrotate` hook reloads the unit so gunicorn
/// reopens them.
pub fn render_policy(settings: &Settings) -> String {
    let log_dir = settings.log_dir.display();
    let reopened = REOPENED_LOGS
        .iter()
        .map(|name| format!("{}/{}", log_dir, name))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"{log_dir}/{captured} {{
{common}    copytruncate
}}

{reopened} {{
{common}    create 0640 {user} {user}
    sharedscripts
    postrotate
        systemctl reload {service} > /dev/null 2>&1 || true
    endscript
}}
"#,
        log_dir = log_dir,
        captured = CAPTURED_LOG,
        common = common_directives(),
        reopened = reopened,
        user = settings.service_user,
        service = settings.service_name,
    )
}

fn common_directives() -> String {
    format!(
        r#"    daily
    missingok
    rotate {}
    compress
    delaycompress
    notifempty
"#,
        RETAINED_GENERATIONS
    )
}
