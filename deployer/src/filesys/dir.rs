//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;
use walkdir::WalkDir;

use crate::errors::DeployError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

/// Counts reported by [`Dir::copy_tree`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), DeployError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Recursively copy this directory's contents into `dest`.
    ///
    /// Entries whose file name is listed in `exclude` are skipped along with
    /// everything below them. Existing files in `dest` are overwritten;
    /// files that only exist in `dest` are left alone. Symlinks are not
    /// followed and are skipped.
    pub async fn copy_tree(
        &self,
        dest: &Path,
        exclude: &[String],
    ) -> Result<CopyStats, DeployError> {
        let src = self.path.clone();
        let dest = dest.to_path_buf();
        let exclude = exclude.to_vec();

        tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dest, &exclude))
            .await
            .map_err(|e| DeployError::Internal(format!("copy task panicked: {}", e)))?
    }

    /// Remove every directory named `dir_name` and every file ending in
    /// `file_suffix` below this directory. Returns the number of entries removed.
    pub async fn purge(&self, dir_name: &str, file_suffix: &str) -> Result<usize, DeployError> {
        let root = self.path.clone();
        let dir_name = dir_name.to_string();
        let file_suffix = file_suffix.to_string();

        tokio::task::spawn_blocking(move || -> Result<usize, DeployError> {
            let mut doomed_dirs = Vec::new();
            let mut doomed_files = Vec::new();
            let mut walker = WalkDir::new(&root).min_depth(1).into_iter();
            while let Some(entry) = walker.next() {
                let entry = entry.map_err(walk_error)?;
                let name = entry.file_name().to_string_lossy();
                if entry.file_type().is_dir() && name == dir_name.as_str() {
                    doomed_dirs.push(entry.path().to_path_buf());
                    walker.skip_current_dir();
                } else if entry.file_type().is_file() && name.ends_with(file_suffix.as_str()) {
                    doomed_files.push(entry.path().to_path_buf());
                }
            }

            for dir in &doomed_dirs {
                std::fs::remove_dir_all(dir)?;
            }
            for file in &doomed_files {
                std::fs::remove_file(file)?;
            }
            Ok(doomed_dirs.len() + doomed_files.len())
        })
        .await
        .map_err(|e| DeployError::Internal(format!("purge task panicked: {}", e)))?
    }
}

/// Canonicalize the deepest existing ancestor of `path` and append the rest
/// lexically, so paths that do not exist yet still compare correctly
fn absolute_path(path: &Path) -> Result<PathBuf, DeployError> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut missing = Vec::new();
    let mut existing = path.as_path();
    let mut resolved = loop {
        match existing.canonicalize() {
            Ok(resolved) => break resolved,
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                // `..` or the root itself; nothing left to strip
                _ => {
                    missing.clear();
                    break path.clone();
                }
            },
        }
    };

    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

fn copy_tree_blocking(
    src: &Path,
    dest: &Path,
    exclude: &[String],
) -> Result<CopyStats, DeployError> {
    if !src.is_dir() {
        return Err(DeployError::ValidationError(format!(
            "source is not a directory: {}",
            src.display()
        )));
    }
    // Copying a tree into itself would recurse forever
    if absolute_path(dest)?.starts_with(src.canonicalize()?) {
        return Err(DeployError::ValidationError(format!(
            "destination {} is inside source {}",
            dest.display(),
            src.display()
        )));
    }

    std::fs::create_dir_all(dest)?;
    let mut stats = CopyStats::default();

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !exclude.iter().any(|x| x.as_str() == name)
        });

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| DeployError::Internal(e.to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
            stats.dirs += 1;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
            stats.files += 1;
        }
    }

    Ok(stats)
}

fn walk_error(err: walkdir::Error) -> DeployError {
    match err.into_io_error() {
        Some(io) => DeployError::IoError(io),
        None => DeployError::Internal("filesystem loop detected".to_string()),
    }
}
