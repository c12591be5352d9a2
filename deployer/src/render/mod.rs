//! Config file rendering
//!
//! Each renderer is a pure function of the settings (and layout for paths),
//! so the same text is produced by `deploy`, `render` and the tests.

pub mod logrotate;
pub mod nginx;
pub mod probe_script;
pub mod systemd;

use std::path::PathBuf;

use crate::storage::layout::Layout;
use crate::storage::settings::Settings;

/// A rendered config file and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Short label used in logs and step names
    pub name: &'static str,

    /// Path the executor writes to (re-rooted)
    pub path: PathBuf,

    /// Path on the target system
    pub real_path: PathBuf,

    /// File contents
    pub contents: String,

    /// Permission bits
    pub mode: u32,
}

/// Render every config artifact for `settings`, in install order
pub fn render_all(settings: &Settings, layout: &Layout) -> Vec<Artifact> {
    vec![
        Artifact {
            name: "systemd unit",
            path: layout.unit_file().path().to_path_buf(),
            real_path: layout.real_unit_file(),
            contents: systemd::render_unit(settings, layout),
            mode: 0o644,
        },
        Artifact {
            name: "nginx site",
            path: layout.nginx_site().path().to_path_buf(),
            real_path: layout.real_nginx_site(),
            contents: nginx::render_site(settings, layout),
            mode: 0o644,
        },
        Artifact {
            name: "logrotate rule",
            path: layout.logrotate_file().path().to_path_buf(),
            real_path: layout.real_logrotate_file(),
            contents: logrotate::render_policy(settings),
            mode: 0o644,
        },
        Artifact {
            name: "health-check script",
            path: layout.health_script().path().to_path_buf(),
            real_path: layout.real_health_script(),
            contents: probe_script::render_script(settings),
            mode: 0o755,
        },
    ]
}

/// Write every artifact under `out_dir`, mirroring its system path
pub async fn write_all(
    settings: &Settings,
    out_dir: &std::path::Path,
) -> Result<Vec<Artifact>, crate::errors::DeployError> {
    let layout = Layout::new(out_dir, settings);
    let artifacts = render_all(settings, &layout);
    for artifact in &artifacts {
        crate::filesys::file::File::new(&artifact.path)
            .write_atomic(artifact.contents.as_bytes(), artifact.mode)
            .await?;
    }
    Ok(artifacts)
}
