use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::snapshot::{Snapshot, SnapshotKind};
use crate::store::ResourceStore;

/// Single-value resource store.
pub type BlobStorage<B> = ResourceStore<BlobCell<B>>;

/// At most one value of type `B`. Empty means nothing to save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobCell<B> {
    value: Option<B>,
}

impl<B> Default for BlobCell<B> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<B> BlobCell<B> {
    pub fn get(&self) -> Option<&B> {
        self.value.as_ref()
    }

    /// Replace the value, returning the previous one.
    pub fn set(&mut self, value: B) -> Option<B> {
        self.value.replace(value)
    }

    pub fn clear(&mut self) -> Option<B> {
        self.value.take()
    }
}

impl<B> Snapshot for BlobCell<B>
where
    B: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    const KIND: SnapshotKind = SnapshotKind::Blob;
    const RESOURCE: &'static str = "blob.bin";

    fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        let mut cell = BlobCell::default();
        assert!(cell.get().is_none());
        assert!(Snapshot::is_empty(&cell));
        assert_eq!(cell.set(vec![1u8, 2]), None);
        assert_eq!(cell.set(vec![3u8]), Some(vec![1, 2]));
        assert_eq!(cell.get(), Some(&vec![3u8]));
        assert!(!Snapshot::is_empty(&cell));
        assert_eq!(cell.clear(), Some(vec![3u8]));
        assert!(Snapshot::is_empty(&cell));
    }
}
