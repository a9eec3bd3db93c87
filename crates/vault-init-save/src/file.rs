//! Local JSON file backend

use crate::{check_existing, vacant, Existing, Overwrite, SaveError, SaveMethod};
use async_trait::async_trait;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::io::Write;
use tracing::{debug, info};
use vault_init_core::{BootstrapResult, SaveLocation};
use zeroize::Zeroizing;

/// Stores the result as a JSON document on the local filesystem.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the target, so readers never observe a partial document.
/// The file is created with owner-only permissions.
#[derive(Debug, Clone)]
pub struct FileSaveMethod {
    path: Utf8PathBuf,
}

impl FileSaveMethod {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn parent_dir(&self) -> Utf8PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        }
    }

    async fn write_atomic(&self, document: Zeroizing<String>) -> Result<(), SaveError> {
        let dir = self.parent_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SaveError::io(dir.as_str(), e))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| SaveError::io(dir.as_str(), e))?;
            tmp.write_all(document.as_bytes())
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|e| SaveError::io(path.as_str(), e))?;
            tmp.persist(&path)
                .map_err(|e| SaveError::io(path.as_str(), e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| SaveError::io(self.path.as_str(), std::io::Error::other(e)))?
    }
}

/// Absolute form of `path` with `.` and `..` removed. Symlinks in the parent
/// directory are resolved when it exists.
pub fn resolve_path(path: &Utf8Path) -> Utf8PathBuf {
    let absolute = if path.is_absolute() {
        path.to_owned()
    } else {
        match std::env::current_dir()
            .ok()
            .and_then(|cwd| Utf8PathBuf::try_from(cwd).ok())
        {
            Some(cwd) => cwd.join(path),
            None => path.to_owned(),
        }
    };

    let mut normalized = Utf8PathBuf::new();
    for component in absolute.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_str()),
        }
    }

    if let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name()) {
        if let Ok(parent) = parent.canonicalize_utf8() {
            return parent.join(name);
        }
    }
    normalized
}

/// True when both paths name the same file
pub fn same_file(a: &Utf8Path, b: &Utf8Path) -> bool {
    resolve_path(a) == resolve_path(b)
}

#[async_trait]
impl SaveMethod for FileSaveMethod {
    async fn save(
        &self,
        result: &BootstrapResult,
        overwrite: Overwrite,
    ) -> Result<SaveLocation, SaveError> {
        let location = SaveLocation::new(self.path.as_str());

        let stored = match overwrite {
            Overwrite::Never => self.load().await,
            Overwrite::Always => Err(SaveError::not_found(self.path.as_str())),
        };
        if let Existing::Identical = check_existing(stored, result, overwrite, self.path.as_str())? {
            debug!(path = %self.path, "Identical bootstrap result already saved");
            return Ok(location);
        }

        let document = Zeroizing::new(result.to_json().map_err(SaveError::Serialize)?);
        self.write_atomic(document).await?;

        info!(path = %self.path, "Saved bootstrap result to file");
        Ok(location)
    }

    async fn load(&self) -> Result<BootstrapResult, SaveError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Zeroizing::new(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SaveError::not_found(self.path.as_str()));
            }
            Err(e) => return Err(SaveError::io(self.path.as_str(), e)),
        };

        debug!(path = %self.path, "Loaded bootstrap result from file");
        BootstrapResult::from_json(&content)
            .map_err(|e| SaveError::corrupt_json(self.path.as_str(), &e))
    }

    fn name(&self) -> &'static str {
        "file"
    }

    async fn ensure_vacant(&self) -> Result<(), SaveError> {
        vacant(self.load().await, self.path.as_str())
    }
}
