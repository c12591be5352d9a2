//! Deployment plan construction

use std::path::Path;
use std::time::Duration;

use crate::deploy::action::{Action, Plan};
use crate::deploy::runner::CommandSpec;
use crate::render::render_all;
use crate::storage::layout::Layout;
use crate::storage::settings::Settings;

/// Firewall services opened for the proxy
pub const FIREWALL_SERVICES: &[&str] = &["http", "https"];

/// Debian's stock nginx site; it claims port 80 ahead of ours
const DEBIAN_DEFAULT_SITE: &str = "/etc/nginx/sites-enabled/default";

/// Build the full deployment plan.
///
/// `source_dir` is the app source tree to install. Rendered configs refer to
/// real system paths; everything the executor touches goes through `layout`.
pub fn build_deploy_plan(settings: &Settings, layout: &Layout, source_dir: &Path) -> Plan {
    let mut plan = Plan::new("deploy");
    let user = settings.service_user.clone();
    let unit = format!("{}.service", settings.service_name);
    let app_dir = layout.app_dir().path().to_path_buf();
    let venv = layout.venv_dir().path().to_path_buf();

    // Account and directories
    plan.push(
        "ensure service account",
        Action::EnsureUser {
            name: user.clone(),
            home: settings.app_dir.clone(),
        },
    );
    plan.push(
        "create install directory",
        Action::EnsureDir {
            path: app_dir.clone(),
            owner: Some(user.clone()),
        },
    );
    plan.push(
        "create log directory",
        Action::EnsureDir {
            path: layout.log_dir().path().to_path_buf(),
            owner: Some(user.clone()),
        },
    );

    // Application files and dependencies
    plan.push(
        "copy application files",
        Action::CopyTree {
            from: source_dir.to_path_buf(),
            to: app_dir.clone(),
            exclude: settings.copy_exclude.clone(),
        },
    );
    plan.run(
        "create virtualenv",
        CommandSpec::new("python3").args(["-m", "venv"]).arg(path_arg(&venv)),
    );
    let mut pip = CommandSpec::new(path_arg(&venv.join("bin").join("pip"))).arg("install");
    if source_dir.join("requirements.txt").is_file() {
        pip = pip.arg("-r").arg(path_arg(&app_dir.join("requirements.txt")));
    }
    plan.run(
        "install application dependencies",
        pip.args(["gunicorn", "ddtrace"]).interactive(),
    );
    plan.run(
        "set install directory ownership",
        CommandSpec::new("chown")
            .arg("-R")
            .arg(format!("{}:{}", user, user))
            .arg(path_arg(&app_dir)),
    );

    // Config artifacts; the unit and site must land before the reloads below
    let mut artifacts = render_all(settings, layout).into_iter();
    let mut write_next = |plan: &mut Plan| {
        if let Some(artifact) = artifacts.next() {
            plan.push(
                format!("install {}", artifact.name),
                Action::WriteFile {
                    path: artifact.path,
                    contents: artifact.contents,
                    mode: artifact.mode,
                },
            );
        }
    };
    write_next(&mut plan); // systemd unit
    write_next(&mut plan); // nginx site
    plan.push(
        "disable default nginx site",
        Action::RemoveFile {
            path: layout.resolve(Path::new(DEBIAN_DEFAULT_SITE)),
        },
    );

    // Firewall
    plan.run(
        "enable firewalld",
        systemctl(["enable", "--now", "firewalld"]),
    );
    for service in FIREWALL_SERVICES {
        plan.run(
            format!("open firewall service {}", service),
            CommandSpec::new("firewall-cmd")
                .arg("--permanent")
                .arg(format!("--add-service={}", service)),
        );
    }
    plan.run(
        "reload firewall",
        CommandSpec::new("firewall-cmd").arg("--reload"),
    );

    // Services
    plan.run("reload systemd units", systemctl(["daemon-reload"]));
    plan.run(format!("enable {}", unit), systemctl(["enable", unit.as_str()]));
    plan.run(format!("restart {}", unit), systemctl(["restart", unit.as_str()]));
    plan.run("enable nginx", systemctl(["enable", "nginx"]));
    plan.run("restart nginx", systemctl(["restart", "nginx"]));

    write_next(&mut plan); // logrotate rule
    write_next(&mut plan); // health-check script

    // Verification
    plan.push(
        "wait for services",
        Action::Sleep(Duration::from_secs(settings.post_deploy_delay_secs)),
    );
    plan.run(
        "show service status",
        systemctl(["status", unit.as_str(), "--no-pager"]).interactive(),
    );
    plan.run(
        "validate nginx config",
        CommandSpec::new("nginx").arg("-t").interactive(),
    );

    plan
}

fn systemctl<'a>(args: impl IntoIterator<Item = &'a str>) -> CommandSpec {
    CommandSpec::new("systemctl").args(args)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
