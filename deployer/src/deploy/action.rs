//! Provisioning plan model

use std::path::PathBuf;
use std::time::Duration;

use crate::deploy::runner::CommandSpec;

/// One desired-state change
#[derive(Debug)]
pub enum Action {
    /// Create a system account (with a same-named group) unless it exists
    EnsureUser { name: String, home: PathBuf },

    /// Create a directory and optionally hand it to `owner`
    EnsureDir { path: PathBuf, owner: Option<String> },

    /// Copy a source tree into place
    CopyTree {
        from: PathBuf,
        to: PathBuf,
        exclude: Vec<String>,
    },

    /// Replace a file's contents
    WriteFile {
        path: PathBuf,
        contents: String,
        mode: u32,
    },

    /// Delete a file if present
    RemoveFile { path: PathBuf },

    /// Run a command; non-zero exit fails the step
    Run(CommandSpec),

    /// Wait before the next step
    Sleep(Duration),
}

impl Action {
    /// One-line description for dry runs and logs
    pub fn describe(&self) -> String {
        match self {
            Action::EnsureUser { name, home } => {
                format!("ensure system user {} (home {})", name, home.display())
            }
            Action::EnsureDir { path, owner } => match owner {
                Some(owner) => format!("mkdir -p {} && chown {}:{}", path.display(), owner, owner),
                None => format!("mkdir -p {}", path.display()),
            },
            Action::CopyTree { from, to, exclude } => format!(
                "copy {} -> {} (excluding {})",
                from.display(),
                to.display(),
                exclude.join(", ")
            ),
            Action::WriteFile {
                path,
                contents,
                mode,
            } => format!(
                "write {} ({} bytes, mode {:04o})",
                path.display(),
                contents.len(),
                mode
            ),
            Action::RemoveFile { path } => format!("rm -f {}", path.display()),
            Action::Run(command) => command.to_string(),
            Action::Sleep(duration) => format!("sleep {}s", duration.as_secs()),
        }
    }
}

/// A labelled action
#[derive(Debug)]
pub struct Step {
    pub label: String,
    pub action: Action,
}

/// An ordered list of steps applied front to back
#[derive(Debug)]
pub struct Plan {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn push(&mut self, label: impl Into<String>, action: Action) -> &mut Self {
        self.steps.push(Step {
            label: label.into(),
            action,
        });
        self
    }

    /// Append a command step
    pub fn run(&mut self, label: impl Into<String>, command: CommandSpec) -> &mut Self {
        self.push(label, Action::Run(command))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Labels in order
    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }

    /// Find a step by label
    pub fn step(&self, label: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.label == label)
    }
}
