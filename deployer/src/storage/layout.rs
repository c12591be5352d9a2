//! Where deploy artifacts live on disk

use std::path::{Component, Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::storage::settings::Settings;

/// Artifact layout for one deployment.
///
/// `real_*` methods return the path as the running system sees it (used
/// inside rendered configs); the other accessors return the same path
/// re-rooted under `root`, which is where the executor actually writes.
/// With the default root of `/` the two are identical.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Filesystem root all artifacts are written under
    pub root: PathBuf,

    app_name: String,
    service_name: String,
    app_dir: PathBuf,
    log_dir: PathBuf,
}

impl Layout {
    /// Create a layout for `settings` rooted at `root`
    pub fn new(root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            root: root.into(),
            app_name: settings.app_name.clone(),
            service_name: settings.service_name.clone(),
            app_dir: settings.app_dir.clone(),
            log_dir: settings.log_dir.clone(),
        }
    }

    /// Re-root an absolute system path under `self.root`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.root.join(relative)
    }

    /// Whether artifacts go to the live system
    pub fn is_live(&self) -> bool {
        self.root == Path::new("/")
    }

    pub fn real_unit_file(&self) -> PathBuf {
        PathBuf::from(format!("/etc/systemd/system/{}.service", self.service_name))
    }

    pub fn real_nginx_site(&self) -> PathBuf {
        PathBuf::from(format!("/etc/nginx/conf.d/{}.conf", self.app_name))
    }

    pub fn real_logrotate_file(&self) -> PathBuf {
        PathBuf::from(format!("/etc/logrotate.d/{}", self.app_name))
    }

    pub fn real_health_script(&self) -> PathBuf {
        PathBuf::from(format!("/usr/local/bin/{}-health", self.app_name))
    }

    pub fn real_venv_dir(&self) -> PathBuf {
        self.app_dir.join("venv")
    }

    pub fn real_static_dir(&self) -> PathBuf {
        self.app_dir.join("static")
    }

    /// Install directory
    pub fn app_dir(&self) -> Dir {
        Dir::new(self.resolve(&self.app_dir))
    }

    /// Log directory
    pub fn log_dir(&self) -> Dir {
        Dir::new(self.resolve(&self.log_dir))
    }

    /// Virtualenv inside the install directory
    pub fn venv_dir(&self) -> Dir {
        Dir::new(self.resolve(&self.real_venv_dir()))
    }

    /// systemd unit file
    pub fn unit_file(&self) -> File {
        File::new(self.resolve(&self.real_unit_file()))
    }

    /// nginx site file
    pub fn nginx_site(&self) -> File {
        File::new(self.resolve(&self.real_nginx_site()))
    }

    /// logrotate rule file
    pub fn logrotate_file(&self) -> File {
        File::new(self.resolve(&self.real_logrotate_file()))
    }

    /// Health-check wrapper script
    pub fn health_script(&self) -> File {
        File::new(self.resolve(&self.real_health_script()))
    }
}
