//! Package manager detection and package lists

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::deploy::runner::CommandSpec;
use crate::errors::DeployError;

/// Package manager selection in settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerChoice {
    #[default]
    Auto,
    Apt,
    Dnf,
    Yum,
}

/// A concrete package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// Binary name, also the detection order
    pub fn binary(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
        }
    }

    /// Resolve a settings choice, probing `PATH` for `auto`
    pub fn resolve(choice: PackageManagerChoice) -> Result<Self, DeployError> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
        Self::resolve_with(choice, |binary| dirs.iter().any(|d| d.join(binary).is_file()))
    }

    /// Resolve a settings choice with a custom "is this binary installed" check
    pub fn resolve_with(
        choice: PackageManagerChoice,
        installed: impl Fn(&str) -> bool,
    ) -> Result<Self, DeployError> {
        match choice {
            PackageManagerChoice::Apt => Ok(PackageManager::Apt),
            PackageManagerChoice::Dnf => Ok(PackageManager::Dnf),
            PackageManagerChoice::Yum => Ok(PackageManager::Yum),
            PackageManagerChoice::Auto => [
                PackageManager::Apt,
                PackageManager::Dnf,
                PackageManager::Yum,
            ]
            .into_iter()
            .find(|pm| installed(pm.binary()))
            .ok_or_else(|| {
                DeployError::UnsupportedPlatform(
                    "no supported package manager found (apt-get, dnf, yum)".to_string(),
                )
            }),
        }
    }

    /// Packages needed to build, run, proxy and supervise the app
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &[
                "python3",
                "python3-pip",
                "python3-venv",
                "python3-dev",
                "build-essential",
                "nginx",
                "firewalld",
                "systemd",
                "logrotate",
                "curl",
                "git",
                "htop",
            ],
            PackageManager::Dnf | PackageManager::Yum => &[
                "python3",
                "python3-pip",
                "python3-devel",
                "gcc",
                "gcc-c++",
                "make",
                "nginx",
                "firewalld",
                "systemd",
                "logrotate",
                "curl",
                "git",
                "htop",
            ],
        }
    }

    /// Refresh the package index
    pub fn refresh_command(&self) -> CommandSpec {
        let command = CommandSpec::new(self.binary()).interactive();
        match self {
            PackageManager::Apt => command
                .arg("update")
                .env("DEBIAN_FRONTEND", "noninteractive"),
            PackageManager::Dnf | PackageManager::Yum => command.args(["makecache", "-y"]),
        }
    }

    /// Install `packages` non-interactively
    pub fn install_command(&self, packages: &[&str]) -> CommandSpec {
        let command = CommandSpec::new(self.binary())
            .args(["install", "-y"])
            .args(packages.iter().copied())
            .interactive();
        match self {
            PackageManager::Apt => command.env("DEBIAN_FRONTEND", "noninteractive"),
            PackageManager::Dnf | PackageManager::Yum => command,
        }
    }
}
