use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use strata_blob::BlobStore;
use strata_types::path::{checkpoint_dir, commit_key, failed_dir};
use strata_types::Checkpoint;
use tracing::{debug, info, warn};

use crate::config::WorkspaceConfig;
use crate::error::{StorageError, StorageResult};
use crate::namespace::Namespace;

/// Outcome of [`Workspace::rollback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rollback {
    /// The load target moved to this older checkpoint.
    To(Checkpoint),
    /// No older checkpoint remains; the load target is now unset.
    Exhausted,
}

/// What [`Workspace::close`] did. Failures are counted, never raised.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Failed checkpoints renamed to their `0__err_` marker.
    pub marked: Vec<Checkpoint>,
    /// Checkpoints deleted by the retention policy.
    pub pruned: Vec<Checkpoint>,
    /// Number of rename/delete/list operations that failed.
    pub failures: usize,
}

#[derive(Debug, Default)]
struct CheckpointState {
    load: Option<Checkpoint>,
    save: Option<Checkpoint>,
    failed: Vec<Checkpoint>,
    recovering: bool,
    closed: bool,
}

/// Root-scoped owner of checkpoint discovery, rollback and retention for
/// one logical index.
///
/// A workspace assumes a single writer. The set of discovered checkpoints
/// is fixed when the workspace is opened; the save checkpoint is assigned
/// once, on first request, and never changes afterwards.
///
/// Teardown is explicit: call [`Workspace::close`] (or use
/// [`Workspace::scoped`]) so failed checkpoints get marked and old ones
/// pruned.
pub struct Workspace {
    store: Arc<dyn BlobStore>,
    root: String,
    retention: usize,
    discovered: Vec<Checkpoint>,
    load_timeout: Option<Duration>,
    start_fresh_on_exhaustion: bool,
    state: Mutex<CheckpointState>,
}

impl Workspace {
    /// Open a workspace at `root` with default recovery settings.
    pub async fn open(
        store: Arc<dyn BlobStore>,
        root: impl Into<String>,
        requested: Checkpoint,
        retention: usize,
    ) -> StorageResult<Arc<Self>> {
        let config = WorkspaceConfig::new(root)
            .with_checkpoint(requested)
            .with_retention(retention);
        Self::from_config(store, &config).await
    }

    /// Open a workspace described by `config`.
    ///
    /// Lists the direct children of the root once and keeps those that
    /// parse as checkpoints, newest first. The first load target is the
    /// requested checkpoint if non-zero, else the newest discovered one,
    /// else the live root.
    pub async fn from_config(
        store: Arc<dyn BlobStore>,
        config: &WorkspaceConfig,
    ) -> StorageResult<Arc<Self>> {
        config.validate()?;
        let root = config.root.trim_end_matches('/').to_string();
        let discovered = discover_checkpoints(store.as_ref(), &root).await?;

        let requested = config.requested_checkpoint();
        let load = if requested.is_live() {
            discovered.first().copied().unwrap_or(requested)
        } else {
            requested
        };
        info!(
            root = %root,
            discovered = discovered.len(),
            load = %load,
            retention = config.retention,
            "opened workspace"
        );

        Ok(Arc::new(Self {
            store,
            root,
            retention: config.retention,
            discovered,
            load_timeout: config.load_timeout(),
            start_fresh_on_exhaustion: config.start_fresh_on_exhaustion,
            state: Mutex::new(CheckpointState {
                load: Some(load),
                ..Default::default()
            }),
        }))
    }

    /// Open a workspace, run `f` with it, and close it on every exit path.
    ///
    /// Returns the result of `f`; teardown problems are only logged.
    pub async fn scoped<F, Fut, T>(
        store: Arc<dyn BlobStore>,
        config: &WorkspaceConfig,
        f: F,
    ) -> StorageResult<T>
    where
        F: FnOnce(Arc<Workspace>) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let workspace = Self::from_config(store, config).await?;
        let result = f(Arc::clone(&workspace)).await;
        workspace.close().await;
        result
    }

    fn state(&self) -> MutexGuard<'_, CheckpointState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout
    }

    pub(crate) fn start_fresh_on_exhaustion(&self) -> bool {
        self.start_fresh_on_exhaustion
    }

    /// Checkpoints found when the workspace was opened, newest first.
    pub fn discovered_checkpoints(&self) -> &[Checkpoint] {
        &self.discovered
    }

    /// The checkpoint the next load will read from, if any.
    pub fn load_checkpoint(&self) -> Option<Checkpoint> {
        self.state().load
    }

    /// The save checkpoint, once assigned by [`Self::save_path`].
    pub fn save_checkpoint(&self) -> Option<Checkpoint> {
        self.state().save
    }

    /// Checkpoints that failed to load during this lifetime, in order.
    pub fn failed_checkpoints(&self) -> Vec<Checkpoint> {
        self.state().failed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// A namespace view scoped to `name`.
    pub fn namespace(self: &Arc<Self>, name: impl Into<String>) -> Namespace {
        Namespace::new(Arc::clone(self), name)
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Prefix to load from, or `None` when there is nothing to load.
    ///
    /// `None` is returned when the load target is unset, and when it is the
    /// live root and the root holds no blobs at all. A versioned checkpoint
    /// without its commit marker was never completely written and fails
    /// with `InvalidStorage`.
    pub async fn load_path(&self) -> StorageResult<Option<String>> {
        let Some(checkpoint) = self.load_checkpoint() else {
            return Ok(None);
        };
        let dir = checkpoint_dir(&self.root, checkpoint);
        if checkpoint.is_live() {
            let entries = self
                .store
                .list(&dir)
                .await
                .map_err(|e| StorageError::blob(&dir, e))?;
            if entries.is_empty() {
                debug!(root = %self.root, "live root is empty, nothing to load");
                return Ok(None);
            }
        } else {
            let marker = commit_key(&dir);
            let committed = self
                .store
                .exists(&marker)
                .await
                .map_err(|e| StorageError::blob(&marker, e))?;
            if !committed {
                return Err(StorageError::storage(
                    &dir,
                    format!("checkpoint {checkpoint} was never committed"),
                ));
            }
        }
        Ok(Some(dir))
    }

    /// Prefix to save to. Assigned on first call, stable afterwards.
    ///
    /// With retention `0` this is always the live root; otherwise a fresh
    /// checkpoint is minted from the wall clock, newer than anything
    /// discovered. Fails while checkpoint recovery is still running, since
    /// the base state has not been validated yet, and after close.
    pub fn save_path(&self) -> StorageResult<String> {
        let mut state = self.state();
        if state.closed {
            return Err(StorageError::usage("workspace is closed"));
        }
        if state.recovering {
            return Err(StorageError::usage(
                "save path requested before checkpoint recovery finished",
            ));
        }
        let checkpoint = match state.save {
            Some(checkpoint) => checkpoint,
            None => {
                let checkpoint = if self.retention == 0 {
                    Checkpoint::LIVE
                } else {
                    Checkpoint::mint_after(self.discovered.first().copied())
                };
                info!(root = %self.root, save = %checkpoint, "assigned save checkpoint");
                state.save = Some(checkpoint);
                checkpoint
            }
        };
        Ok(checkpoint_dir(&self.root, checkpoint))
    }

    /// Mark the save checkpoint as complete.
    ///
    /// Call once every resource of the checkpoint has been written. Loads
    /// refuse versioned checkpoints that were never committed, so a crash
    /// halfway through a save rolls back instead of serving partial state.
    /// Returns the committed checkpoint, or `None` when there is nothing to
    /// commit: no save checkpoint yet, the live root, or an empty directory.
    pub async fn commit(&self) -> StorageResult<Option<Checkpoint>> {
        let Some(checkpoint) = self.save_checkpoint().filter(|cp| !cp.is_live()) else {
            return Ok(None);
        };
        let dir = checkpoint_dir(&self.root, checkpoint);
        let saved = self
            .store
            .list(&dir)
            .await
            .map_err(|e| StorageError::blob(&dir, e))?;
        if saved.is_empty() {
            debug!(checkpoint = %checkpoint, "nothing saved, skipping commit");
            return Ok(None);
        }
        let marker = commit_key(&dir);
        self.store
            .write(&marker, &[])
            .await
            .map_err(|e| StorageError::blob(&marker, e))?;
        info!(checkpoint = %checkpoint, resources = saved.len(), "committed checkpoint");
        Ok(Some(checkpoint))
    }

    // -----------------------------------------------------------------------
    // Rollback
    // -----------------------------------------------------------------------

    /// Move the load target to the newest discovered checkpoint strictly
    /// older than the current one.
    pub fn rollback(&self) -> Rollback {
        let mut state = self.state();
        let Some(current) = state.load else {
            return Rollback::Exhausted;
        };
        match self.discovered.iter().copied().find(|cp| *cp < current) {
            Some(next) => {
                warn!(root = %self.root, from = %current, to = %next, "rolling back to older checkpoint");
                state.load = Some(next);
                Rollback::To(next)
            }
            None => {
                warn!(root = %self.root, last = %current, "no older checkpoint to roll back to");
                state.load = None;
                Rollback::Exhausted
            }
        }
    }

    /// Record the current load target as failed. Returns it, if set.
    pub(crate) fn record_failure(&self) -> Option<Checkpoint> {
        let mut state = self.state();
        let failed = state.load;
        if let Some(checkpoint) = failed {
            state.failed.push(checkpoint);
        }
        failed
    }

    pub(crate) fn begin_recovery(&self) -> StorageResult<()> {
        let mut state = self.state();
        if state.closed {
            return Err(StorageError::usage("workspace is closed"));
        }
        if state.recovering {
            return Err(StorageError::usage("checkpoint recovery is already running"));
        }
        state.recovering = true;
        Ok(())
    }

    pub(crate) fn end_recovery(&self) {
        self.state().recovering = false;
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Mark failed checkpoints and apply the retention policy.
    ///
    /// Idempotent. Every failed positive checkpoint is renamed to
    /// `{root}/0__err_{n}` so later workspaces skip it while it stays
    /// available for inspection. With retention `n > 0`, all but the newest
    /// `n + 1` checkpoints are deleted. Each failure is logged and counted;
    /// none aborts the rest of the cleanup.
    pub async fn close(&self) -> CloseReport {
        let failed = {
            let mut state = self.state();
            if state.closed {
                return CloseReport::default();
            }
            state.closed = true;
            state.failed.clone()
        };
        // Rollback only moves to older checkpoints.
        debug_assert!(failed.windows(2).all(|pair| pair[0] > pair[1]));

        let mut report = CloseReport::default();
        for checkpoint in failed {
            if checkpoint.is_live() {
                warn!(root = %self.root, "live checkpoint failed to load and cannot be marked");
                continue;
            }
            let from = checkpoint_dir(&self.root, checkpoint);
            let to = failed_dir(&self.root, checkpoint);
            match self.store.rename_tree(&from, &to).await {
                Ok(0) => {
                    debug!(checkpoint = %checkpoint, "failed checkpoint has no blobs, nothing to mark");
                }
                Ok(moved) => {
                    info!(checkpoint = %checkpoint, to = %to, blobs = moved, "marked failed checkpoint");
                    report.marked.push(checkpoint);
                }
                Err(e) => {
                    warn!(checkpoint = %checkpoint, error = %e, "could not mark failed checkpoint");
                    report.failures += 1;
                }
            }
        }

        if self.retention > 0 {
            match discover_checkpoints(self.store.as_ref(), &self.root).await {
                Ok(checkpoints) => {
                    for &checkpoint in checkpoints.iter().skip(self.retention + 1) {
                        let dir = checkpoint_dir(&self.root, checkpoint);
                        match self.store.delete_tree(&dir).await {
                            Ok(removed) => {
                                info!(checkpoint = %checkpoint, blobs = removed, "pruned checkpoint");
                                report.pruned.push(checkpoint);
                            }
                            Err(e) => {
                                warn!(checkpoint = %checkpoint, error = %e, "could not prune checkpoint");
                                report.failures += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(root = %self.root, error = %e, "could not list checkpoints for retention");
                    report.failures += 1;
                }
            }
        }
        report
    }
}

/// Positive checkpoints directly under `root`, newest first.
pub async fn discover_checkpoints(
    store: &dyn BlobStore,
    root: &str,
) -> StorageResult<Vec<Checkpoint>> {
    let children = store
        .children(root)
        .await
        .map_err(|e| StorageError::blob(root, e))?;
    let mut checkpoints: Vec<Checkpoint> = children
        .iter()
        .filter_map(|name| Checkpoint::parse_dir_name(name))
        .collect();
    checkpoints.sort_unstable_by(|a, b| b.cmp(a));
    Ok(checkpoints)
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.closed && (!state.failed.is_empty() || self.retention > 0) {
            warn!(
                root = %self.root,
                failed = state.failed.len(),
                "workspace dropped without close(); cleanup skipped"
            );
        }
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("retention", &self.retention)
            .field("discovered", &self.discovered)
            .field("load", &state.load)
            .field("save", &state.save)
            .field("failed", &state.failed)
            .finish()
    }
}
