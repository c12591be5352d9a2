//! File operations

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::DeployError;
use crate::utils::{generate_uuid, sha256_hash};

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeployError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// SHA256 of the current contents, `None` if the file is missing
    pub async fn digest(&self) -> Option<String> {
        fs::read(&self.path).await.ok().map(|bytes| sha256_hash(&bytes))
    }

    /// Replace the file contents atomically and set its mode.
    ///
    /// Writes a sibling temp file, syncs it, applies `mode`, then renames it
    /// over the target so readers never observe a half-written config.
    pub async fn write_atomic(&self, contents: &[u8], mode: u32) -> Result<(), DeployError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).await?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DeployError::ValidationError(format!("not a file path: {}", self.path.display()))
            })?;
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, generate_uuid()));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = set_mode(&temp_path, mode).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete the file
    pub async fn delete(&self) -> Result<(), DeployError> {
        if self.exists().await {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }

    /// Current permission bits (Unix only)
    #[cfg(unix)]
    pub async fn mode(&self) -> Result<u32, DeployError> {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(&self.path).await?;
        Ok(meta.permissions().mode() & 0o7777)
    }
}

/// Set permission bits on Unix. A no-op on other platforms.
async fn set_mode(path: &Path, mode: u32) -> Result<(), DeployError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
