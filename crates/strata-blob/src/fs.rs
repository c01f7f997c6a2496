use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;

/// Prefix of in-flight temporary files; never reported by `list`.
const TEMP_PREFIX: &str = ".strata-tmp";

/// Blob store backed by a local directory.
///
/// Every blob is a file at `{base}/{path}`. Writes go to a temporary file
/// in the target directory and are renamed into place, so a crash never
/// leaves a half-written blob under its final name. Directories emptied by
/// `delete` or `rename` are removed, keeping "directory exists" equivalent
/// to "some blob lives under it".
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    base: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `base`, creating the directory if needed.
    pub fn open(base: impl AsRef<Path>) -> BlobResult<Self> {
        let base = base.as_ref().to_path_buf();
        std::fs::create_dir_all(&base)
            .map_err(|e| BlobError::io(&base.display().to_string(), e))?;
        Ok(Self { base })
    }

    /// The directory this store is rooted at.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, path: &str) -> BlobResult<PathBuf> {
        strata_types::validate_blob_path(path)?;
        Ok(path.split('/').fold(self.base.clone(), |acc, part| acc.join(part)))
    }

    fn resolve_prefix(&self, prefix: &str) -> BlobResult<PathBuf> {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            Ok(self.base.clone())
        } else {
            self.resolve(prefix)
        }
    }

    /// Remove empty directories from `start` up to (not including) the base.
    async fn prune_empty_dirs(&self, start: Option<&Path>) {
        let mut current = start.map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == self.base || !dir.starts_with(&self.base) {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the walk.
            if tokio::fs::remove_dir(&dir).await.is_err() {
                break;
            }
            current = dir.parent().map(Path::to_path_buf);
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, path: &str) -> BlobResult<bool> {
        let target = self.resolve_prefix(path)?;
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => Ok(!self.list(path).await?.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::io(path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        let dir = self.resolve_prefix(prefix)?;
        let base = self.base.clone();
        let prefix_owned = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            if !dir.is_dir() {
                return Ok(Vec::new());
            }
            let mut paths = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1) {
                let entry = entry.map_err(|e| BlobError::Io {
                    path: prefix_owned.clone(),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file()
                    || entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX)
                {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&base) else {
                    continue;
                };
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                paths.push(key.join("/"));
            }
            paths.sort();
            Ok(paths)
        })
        .await
        .map_err(|e| BlobError::Backend(format!("listing task failed: {e}")))?
    }

    async fn read(&self, path: &str) -> BlobResult<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| BlobError::io(path, e))
    }

    async fn write(&self, path: &str, data: &[u8]) -> BlobResult<()> {
        let target = self.resolve(path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base.clone());
        let key = path.to_string();
        let len = data.len();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> BlobResult<()> {
            std::fs::create_dir_all(&parent).map_err(|e| BlobError::io(&key, e))?;
            let mut tmp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(&parent)
                .map_err(|e| BlobError::io(&key, e))?;
            tmp.write_all(&data).map_err(|e| BlobError::io(&key, e))?;
            tmp.as_file().sync_all().map_err(|e| BlobError::io(&key, e))?;
            tmp.persist(&target)
                .map_err(|e| BlobError::io(&key, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| BlobError::Backend(format!("write task failed: {e}")))??;
        debug!(path, bytes = len, "wrote blob");
        Ok(())
    }

    async fn delete(&self, path: &str) -> BlobResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                self.prune_empty_dirs(target.parent()).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::io(path, e)),
        }
    }

    async fn rename(&self, old: &str, new: &str) -> BlobResult<()> {
        let from = self.resolve(old)?;
        let to = self.resolve(new)?;
        if !tokio::fs::try_exists(&from)
            .await
            .map_err(|e| BlobError::io(old, e))?
        {
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::io(new, e))?;
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| BlobError::io(old, e))?;
        self.prune_empty_dirs(from.parent()).await;
        Ok(())
    }
}
