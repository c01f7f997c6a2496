use async_trait::async_trait;
use strata_types::path::{child_name, join};

use crate::error::BlobResult;

/// Flat key/value blob storage addressed by `/`-separated paths.
///
/// "Directories" are prefixes: a directory exists while at least one blob
/// lives under it. Implementations must satisfy:
/// - `list` returns full paths, sorted, of every blob strictly under
///   `prefix/` (recursively). An empty prefix lists the whole store.
/// - `read` fails with `NotFound` for a missing blob.
/// - `write` overwrites.
/// - `delete` and `rename` are no-ops when the source is absent.
/// - No locking is provided; callers isolate themselves by prefix.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `true` if a blob exists at `path` or any blob lives under `path/`.
    async fn exists(&self, path: &str) -> BlobResult<bool>;

    /// Every blob path under `prefix/`, sorted.
    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>>;

    async fn read(&self, path: &str) -> BlobResult<Vec<u8>>;

    async fn write(&self, path: &str, data: &[u8]) -> BlobResult<()>;

    async fn delete(&self, path: &str) -> BlobResult<()>;

    async fn rename(&self, old: &str, new: &str) -> BlobResult<()>;

    /// Distinct names of the direct children of `prefix`, sorted.
    async fn children(&self, prefix: &str) -> BlobResult<Vec<String>> {
        let paths = self.list(prefix).await?;
        let mut names: Vec<String> = paths
            .iter()
            .filter_map(|path| child_name(prefix, path))
            .map(str::to_string)
            .collect();
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }

    /// Delete every blob under `prefix/`. Returns the number removed.
    ///
    /// Stops at the first failing delete; blobs already removed stay removed.
    async fn delete_tree(&self, prefix: &str) -> BlobResult<usize> {
        let paths = self.list(prefix).await?;
        for path in &paths {
            self.delete(path).await?;
        }
        Ok(paths.len())
    }

    /// Move every blob under `old/` to the same relative path under `new/`.
    /// Returns the number moved.
    async fn rename_tree(&self, old: &str, new: &str) -> BlobResult<usize> {
        let old = old.trim_end_matches('/');
        let paths = self.list(old).await?;
        for path in &paths {
            let relative = &path[old.len()..];
            self.rename(path, &join(new, relative)).await?;
        }
        Ok(paths.len())
    }
}
