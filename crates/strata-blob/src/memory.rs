use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;

/// A blob store operation, used to target injected faults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobOp {
    List,
    Read,
    Write,
    Delete,
    Rename,
}

impl fmt::Display for BlobOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Delete => write!(f, "delete"),
            Self::Rename => write!(f, "rename"),
        }
    }
}

#[derive(Clone, Debug)]
struct Fault {
    op: BlobOp,
    prefix: String,
}

/// In-memory, `BTreeMap`-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock` and
/// cloned on read/write. Faults can be injected per operation and path
/// prefix to exercise failure handling in the layers above.
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    faults: RwLock<Vec<Fault>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Vec::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// All blob paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.blobs.read().expect("lock poisoned").keys().cloned().collect()
    }

    /// Remove all blobs from the store.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }

    /// Make every `op` on a path starting with `prefix` fail with a backend
    /// error until [`Self::clear_faults`] is called.
    pub fn fail_on(&self, op: BlobOp, prefix: impl Into<String>) {
        self.faults.write().expect("lock poisoned").push(Fault {
            op,
            prefix: prefix.into(),
        });
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.faults.write().expect("lock poisoned").clear();
    }

    fn check_fault(&self, op: BlobOp, path: &str) -> BlobResult<()> {
        let faults = self.faults.read().expect("lock poisoned");
        if faults
            .iter()
            .any(|fault| fault.op == op && path.starts_with(&fault.prefix))
        {
            return Err(BlobError::Backend(format!("injected {op} fault at {path}")));
        }
        Ok(())
    }
}

fn dir_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}/")
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn exists(&self, path: &str) -> BlobResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        if map.contains_key(path) {
            return Ok(true);
        }
        let dir = dir_prefix(path);
        Ok(map
            .range(dir.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&dir)))
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        self.check_fault(BlobOp::List, prefix)?;
        let map = self.blobs.read().expect("lock poisoned");
        let dir = dir_prefix(prefix);
        Ok(map
            .range(dir.clone()..)
            .take_while(|(key, _)| key.starts_with(&dir))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn read(&self, path: &str) -> BlobResult<Vec<u8>> {
        self.check_fault(BlobOp::Read, path)?;
        let map = self.blobs.read().expect("lock poisoned");
        map.get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, data: &[u8]) -> BlobResult<()> {
        self.check_fault(BlobOp::Write, path)?;
        strata_types::validate_blob_path(path)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> BlobResult<()> {
        self.check_fault(BlobOp::Delete, path)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        map.remove(path);
        Ok(())
    }

    async fn rename(&self, old: &str, new: &str) -> BlobResult<()> {
        self.check_fault(BlobOp::Rename, old)?;
        strata_types::validate_blob_path(new)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        if let Some(data) = map.remove(old) {
            map.insert(new.to_string(), data);
        }
        Ok(())
    }
}

impl fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> InMemoryBlobStore {
        let store = InMemoryBlobStore::new();
        for path in [
            "idx/5/graph_nodes",
            "idx/5/graph_edges",
            "idx/3/graph_nodes",
            "idx/0__err_9/graph_nodes",
            "idx/graph_nodes",
            "other/1/graph_nodes",
        ] {
            store.write(path, path.as_bytes()).await.unwrap();
        }
        store
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_and_read() {
        let store = InMemoryBlobStore::new();
        store.write("a/b", b"hello").await.unwrap();
        assert_eq!(store.read("a/b").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn write_overwrites() {
        let store = InMemoryBlobStore::new();
        store.write("a/b", b"one").await.unwrap();
        store.write("a/b", b"two").await.unwrap();
        assert_eq!(store.read("a/b").await.unwrap(), b"two");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let store = InMemoryBlobStore::new();
        let err = store.read("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn write_rejects_invalid_paths() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.write("a/../b", b"x").await,
            Err(BlobError::InvalidPath(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryBlobStore::new();
        store.write("a", b"x").await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn rename_moves_and_ignores_missing() {
        let store = InMemoryBlobStore::new();
        store.write("a", b"x").await.unwrap();
        store.rename("a", "b").await.unwrap();
        assert_eq!(store.read("b").await.unwrap(), b"x");
        assert!(!store.exists("a").await.unwrap());
        store.rename("nope", "c").await.unwrap();
        assert!(!store.exists("c").await.unwrap());
    }

    // -----------------------------------------------------------------------
    // Prefix semantics
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_is_recursive_and_bounded_by_segment() {
        let store = seeded().await;
        store.write("idx2/1/graph_nodes", b"x").await.unwrap();
        let paths = store.list("idx").await.unwrap();
        assert_eq!(paths.len(), 5);
        assert!(paths.iter().all(|p| p.starts_with("idx/")));
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn list_empty_prefix_lists_everything() {
        let store = seeded().await;
        assert_eq!(store.list("").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn exists_covers_blobs_and_prefixes() {
        let store = seeded().await;
        assert!(store.exists("idx").await.unwrap());
        assert!(store.exists("idx/5").await.unwrap());
        assert!(store.exists("idx/5/graph_nodes").await.unwrap());
        assert!(!store.exists("idx/4").await.unwrap());
        assert!(!store.exists("id").await.unwrap());
    }

    #[tokio::test]
    async fn children_are_distinct_direct_names() {
        let store = seeded().await;
        let children = store.children("idx").await.unwrap();
        assert_eq!(children, vec!["0__err_9", "3", "5", "graph_nodes"]);
    }

    #[tokio::test]
    async fn delete_tree_removes_only_the_prefix() {
        let store = seeded().await;
        assert_eq!(store.delete_tree("idx/5").await.unwrap(), 2);
        assert!(!store.exists("idx/5").await.unwrap());
        assert!(store.exists("idx/3").await.unwrap());
    }

    #[tokio::test]
    async fn rename_tree_moves_all_blobs() {
        let store = seeded().await;
        assert_eq!(store.rename_tree("idx/5", "idx/0__err_5").await.unwrap(), 2);
        assert!(!store.exists("idx/5").await.unwrap());
        assert_eq!(
            store.read("idx/0__err_5/graph_edges").await.unwrap(),
            b"idx/5/graph_edges"
        );
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn injected_faults_match_op_and_prefix() {
        let store = seeded().await;
        store.fail_on(BlobOp::Read, "idx/5");
        assert!(matches!(
            store.read("idx/5/graph_nodes").await,
            Err(BlobError::Backend(_))
        ));
        assert!(store.read("idx/3/graph_nodes").await.is_ok());
        assert!(store.delete("idx/5/graph_nodes").await.is_ok());

        store.clear_faults();
        store.write("idx/5/graph_nodes", b"y").await.unwrap();
        assert_eq!(store.read("idx/5/graph_nodes").await.unwrap(), b"y");
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn len_bytes_and_clear() {
        let store = InMemoryBlobStore::default();
        assert!(store.is_empty());
        store.write("a", b"12345").await.unwrap();
        store.write("b", b"123456789").await.unwrap();
        assert_eq!(store.total_bytes(), 14);
        assert_eq!(store.paths(), vec!["a", "b"]);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBlobStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBlobStore"));
        assert!(debug.contains("blob_count"));
    }
}
