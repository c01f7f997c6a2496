use std::fmt;
use std::mem;

use async_trait::async_trait;
use strata_workspace::{Namespace, StorageError, StorageResult};
use tracing::debug;

use crate::frame::{self, Compression};
use crate::snapshot::Snapshot;

/// Lifecycle phase of a [`ResourceStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadedForInsert,
    LoadedForQuery,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LoadedForInsert => write!(f, "loaded for insert"),
            Self::LoadedForQuery => write!(f, "loaded for query"),
        }
    }
}

/// The two-phase contract shared by every resource store.
///
/// `*_start` loads persisted state, `*_done` releases it (and, for inserts,
/// persists it and commits the save checkpoint). A failed or cancelled
/// start leaves the store idle.
#[async_trait]
pub trait Lifecycle: Send {
    /// Resource name inside the namespace.
    fn resource(&self) -> &str;

    fn phase(&self) -> Phase;

    async fn insert_start(&mut self) -> StorageResult<()>;

    async fn insert_done(&mut self) -> StorageResult<()>;

    /// Finish an insert like `insert_done` without committing the save
    /// checkpoint. Used when several stores share one commit.
    async fn write_back(&mut self) -> StorageResult<()>;

    async fn query_start(&mut self) -> StorageResult<()>;

    async fn query_done(&mut self) -> StorageResult<()>;

    /// Drop in-memory state and return to idle without writing anything.
    fn abort(&mut self);
}

/// A single persisted resource of a [`Namespace`], loaded and saved as one
/// snapshot frame.
pub struct ResourceStore<S: Snapshot> {
    namespace: Namespace,
    resource: String,
    compression: Compression,
    phase: Phase,
    data: S,
    loaded_from: Option<String>,
}

impl<S: Snapshot> ResourceStore<S> {
    /// A store for the default resource name of `S`.
    pub fn new(namespace: Namespace) -> Self {
        Self::with_resource(namespace, S::RESOURCE)
    }

    pub fn with_resource(namespace: Namespace, resource: impl Into<String>) -> Self {
        Self {
            namespace,
            resource: resource.into(),
            compression: Compression::None,
            phase: Phase::Idle,
            data: S::default(),
            loaded_from: None,
        }
    }

    /// Compress frames written by this store.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// The loaded snapshot. Fails while idle.
    pub fn data(&self) -> StorageResult<&S> {
        match self.phase {
            Phase::Idle => Err(self.wrong_phase("read data")),
            _ => Ok(&self.data),
        }
    }

    /// Mutable access to the loaded snapshot. Only during an insert.
    pub fn data_mut(&mut self) -> StorageResult<&mut S> {
        match self.phase {
            Phase::LoadedForInsert => Ok(&mut self.data),
            _ => Err(self.wrong_phase("modify data")),
        }
    }

    pub async fn insert_start(&mut self) -> StorageResult<()> {
        self.require(Phase::Idle, "insert_start")?;
        self.load().await?;
        self.phase = Phase::LoadedForInsert;
        Ok(())
    }

    /// Persist the snapshot, commit the save checkpoint and return to idle.
    pub async fn insert_done(&mut self) -> StorageResult<()> {
        self.write_back().await?;
        self.namespace.workspace().commit().await?;
        Ok(())
    }

    /// Persist the snapshot and return to idle, leaving the save checkpoint
    /// uncommitted.
    ///
    /// An empty snapshot is only written when a persisted copy was loaded,
    /// so that clearing a resource is durable.
    pub async fn write_back(&mut self) -> StorageResult<()> {
        self.require(Phase::LoadedForInsert, "insert_done")?;
        self.phase = Phase::Idle;
        let data = mem::take(&mut self.data);
        let loaded_from = self.loaded_from.take();
        if data.is_empty() && loaded_from.is_none() {
            debug!(resource = %self.resource, "nothing to save");
            return Ok(());
        }

        let key = self.namespace.save_path(&self.resource)?;
        let bytes =
            frame::encode(&data, self.compression).map_err(|e| StorageError::storage(&key, e))?;
        self.namespace
            .store()
            .write(&key, &bytes)
            .await
            .map_err(|e| StorageError::blob(&key, e))?;
        debug!(key = %key, bytes = bytes.len(), "saved resource");
        Ok(())
    }

    pub async fn query_start(&mut self) -> StorageResult<()> {
        self.require(Phase::Idle, "query_start")?;
        self.load().await?;
        self.phase = Phase::LoadedForQuery;
        Ok(())
    }

    /// Release the snapshot. Never writes.
    pub async fn query_done(&mut self) -> StorageResult<()> {
        self.require(Phase::LoadedForQuery, "query_done")?;
        self.abort();
        Ok(())
    }

    pub fn abort(&mut self) {
        self.phase = Phase::Idle;
        self.data = S::default();
        self.loaded_from = None;
    }

    async fn load(&mut self) -> StorageResult<()> {
        let Some(key) = self.namespace.load_path(&self.resource).await? else {
            debug!(resource = %self.resource, "no load target, starting empty");
            self.data = S::default();
            self.loaded_from = None;
            return Ok(());
        };

        let bytes = match self.namespace.store().read(&key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "resource not persisted yet, starting empty");
                self.data = S::default();
                self.loaded_from = None;
                return Ok(());
            }
            Err(e) => return Err(StorageError::blob(&key, e)),
        };
        self.data = frame::decode(&bytes).map_err(|e| StorageError::storage(&key, e))?;
        debug!(key = %key, bytes = bytes.len(), "loaded resource");
        self.loaded_from = Some(key);
        Ok(())
    }

    fn require(&self, expected: Phase, operation: &str) -> StorageResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(self.wrong_phase(operation))
        }
    }

    fn wrong_phase(&self, operation: &str) -> StorageError {
        StorageError::usage(format!(
            "cannot {operation} on {}/{} while {}",
            self.namespace.name(),
            self.resource,
            self.phase
        ))
    }
}

#[async_trait]
impl<S: Snapshot> Lifecycle for ResourceStore<S> {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    async fn insert_start(&mut self) -> StorageResult<()> {
        ResourceStore::insert_start(self).await
    }

    async fn insert_done(&mut self) -> StorageResult<()> {
        ResourceStore::insert_done(self).await
    }

    async fn write_back(&mut self) -> StorageResult<()> {
        ResourceStore::write_back(self).await
    }

    async fn query_start(&mut self) -> StorageResult<()> {
        ResourceStore::query_start(self).await
    }

    async fn query_done(&mut self) -> StorageResult<()> {
        ResourceStore::query_done(self).await
    }

    fn abort(&mut self) {
        ResourceStore::abort(self)
    }
}

impl<S: Snapshot + fmt::Debug> fmt::Debug for ResourceStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("namespace", &self.namespace.name())
            .field("resource", &self.resource)
            .field("phase", &self.phase)
            .field("data", &self.data)
            .finish()
    }
}
