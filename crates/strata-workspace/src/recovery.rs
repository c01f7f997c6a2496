//! Checkpoint recovery: retry a load against successively older
//! checkpoints until one succeeds.

use std::future::Future;

use strata_types::Checkpoint;
use tracing::{error, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::workspace::{Rollback, Workspace};

/// One recovery pass over a workspace's checkpoints.
///
/// Created by [`Workspace::recovery`]. While it is alive the workspace
/// refuses to hand out a save path, so nothing can be written on top of
/// state that has not been loaded successfully yet. Dropping it (including
/// when the future driving it is cancelled) ends the pass.
///
/// ```ignore
/// let mut recovery = workspace.recovery()?;
/// loop {
///     match recovery.attempt(load_everything()).await {
///         Ok(state) => break state,
///         Err(err) => recovery.fail(err)?,
///     }
/// }
/// ```
pub struct Recovery<'a> {
    workspace: &'a Workspace,
    attempts: usize,
    fresh_start_used: bool,
}

impl<'a> Recovery<'a> {
    pub(crate) fn new(workspace: &'a Workspace) -> StorageResult<Self> {
        workspace.begin_recovery()?;
        Ok(Self {
            workspace,
            attempts: 0,
            fresh_start_used: false,
        })
    }

    /// The checkpoint the next attempt loads from. `None` means every
    /// resource starts empty.
    pub fn current(&self) -> Option<Checkpoint> {
        self.workspace.load_checkpoint()
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Run one load attempt, bounded by the workspace load timeout.
    ///
    /// A timed-out attempt is dropped and reported as
    /// [`StorageError::Cancelled`].
    pub async fn attempt<F, T>(&mut self, load: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        self.attempts += 1;
        match self.workspace.load_timeout() {
            Some(limit) => tokio::time::timeout(limit, load)
                .await
                .map_err(|_| StorageError::Cancelled {
                    reason: format!("load exceeded {}ms", limit.as_millis()),
                })?,
            None => load.await,
        }
    }

    /// Record a failed attempt and move to the next older checkpoint.
    ///
    /// Returns `Ok(())` when another attempt should be made. Errors that a
    /// different checkpoint cannot cure are returned unchanged; when no
    /// checkpoint is left the result is [`StorageError::RecoveryExhausted`].
    pub fn fail(&mut self, err: StorageError) -> StorageResult<()> {
        if !err.is_retryable() {
            return Err(err);
        }
        let failed = self.workspace.record_failure();
        warn!(
            root = %self.workspace.root(),
            checkpoint = ?failed,
            attempt = self.attempts,
            error = %err,
            "checkpoint failed to load"
        );
        match self.workspace.rollback() {
            Rollback::To(_) => Ok(()),
            Rollback::Exhausted
                if self.workspace.start_fresh_on_exhaustion() && !self.fresh_start_used =>
            {
                warn!(root = %self.workspace.root(), "all checkpoints failed, starting from empty state");
                self.fresh_start_used = true;
                Ok(())
            }
            Rollback::Exhausted => {
                let failed = self.workspace.failed_checkpoints();
                error!(root = %self.workspace.root(), failed = ?failed, "checkpoint recovery exhausted");
                Err(StorageError::RecoveryExhausted {
                    root: self.workspace.root().to_string(),
                    failed,
                    last: Box::new(err),
                })
            }
        }
    }
}

impl Drop for Recovery<'_> {
    fn drop(&mut self) {
        self.workspace.end_recovery();
    }
}

impl Workspace {
    /// Begin a recovery pass. Only one pass may run at a time.
    pub fn recovery(&self) -> StorageResult<Recovery<'_>> {
        Recovery::new(self)
    }

    /// Run `init` against the current load checkpoint, rolling back to
    /// older checkpoints until it succeeds.
    ///
    /// `init` should read its inputs through this workspace's load paths.
    /// Attempts run strictly one after another.
    pub async fn with_checkpoints<F, Fut, T>(&self, mut init: F) -> StorageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut recovery = self.recovery()?;
        loop {
            match recovery.attempt(init()).await {
                Ok(value) => {
                    info!(
                        root = %self.root(),
                        checkpoint = ?recovery.current(),
                        attempts = recovery.attempts(),
                        "loaded checkpoint"
                    );
                    return Ok(value);
                }
                Err(err) => recovery.fail(err)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use strata_blob::{BlobStore, InMemoryBlobStore};

    use crate::config::WorkspaceConfig;

    async fn open_with(checkpoints: &[u64], config: WorkspaceConfig) -> (Arc<InMemoryBlobStore>, Arc<Workspace>) {
        let store = Arc::new(InMemoryBlobStore::new());
        for cp in checkpoints {
            store
                .write(&format!("idx/{cp}/graph_nodes"), b"x")
                .await
                .unwrap();
        }
        let ws = Workspace::from_config(store.clone(), &config).await.unwrap();
        (store, ws)
    }

    async fn open(checkpoints: &[u64]) -> (Arc<InMemoryBlobStore>, Arc<Workspace>) {
        open_with(checkpoints, WorkspaceConfig::new("idx")).await
    }

    fn corrupt(cp: Option<Checkpoint>) -> StorageError {
        StorageError::storage(format!("idx/{cp:?}"), "corrupt snapshot")
    }

    fn cps(values: &[u64]) -> Vec<Checkpoint> {
        values.iter().copied().map(Checkpoint::new).collect()
    }

    #[tokio::test]
    async fn first_checkpoint_succeeds() {
        let (_store, ws) = open(&[5, 3]).await;
        let ws_ref = &*ws;
        let loaded = ws
            .with_checkpoints(move || async move { Ok(ws_ref.load_checkpoint()) })
            .await
            .unwrap();
        assert_eq!(loaded, Some(Checkpoint::new(5)));
        assert!(ws.failed_checkpoints().is_empty());
    }

    #[tokio::test]
    async fn rolls_back_past_failed_checkpoint() {
        let (store, ws) = open(&[5, 3, 1]).await;
        let ws_ref = &*ws;
        let loaded = ws
            .with_checkpoints(move || async move {
                let cp = ws_ref.load_checkpoint();
                if cp == Some(Checkpoint::new(5)) {
                    Err(corrupt(cp))
                } else {
                    Ok(cp)
                }
            })
            .await
            .unwrap();
        assert_eq!(loaded, Some(Checkpoint::new(3)));
        assert_eq!(ws.load_checkpoint(), Some(Checkpoint::new(3)));
        assert_eq!(ws.failed_checkpoints(), cps(&[5]));

        ws.close().await;
        assert!(store.exists("idx/0__err_5").await.unwrap());
        assert!(!store.exists("idx/5").await.unwrap());
    }

    #[tokio::test]
    async fn exhaustion_reports_every_failure() {
        let (_store, ws) = open(&[5, 3, 1]).await;
        let ws_ref = &*ws;
        let err = ws
            .with_checkpoints(move || async move {
                Err::<(), _>(corrupt(ws_ref.load_checkpoint()))
            })
            .await
            .unwrap_err();
        match err {
            StorageError::RecoveryExhausted { root, failed, .. } => {
                assert_eq!(root, "idx");
                assert_eq!(failed, cps(&[5, 3, 1]));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(ws.load_checkpoint(), None);
        assert_eq!(ws.close().await.marked, cps(&[5, 3, 1]));
    }

    #[tokio::test]
    async fn fresh_start_after_exhaustion() {
        let config = WorkspaceConfig::new("idx").with_fresh_start_on_exhaustion(true);
        let (_store, ws) = open_with(&[5, 3], config).await;
        let ws_ref = &*ws;
        let loaded = ws
            .with_checkpoints(move || async move {
                match ws_ref.load_checkpoint() {
                    Some(cp) => Err(corrupt(Some(cp))),
                    None => Ok(ws_ref.load_path().await?),
                }
            })
            .await
            .unwrap();
        assert_eq!(loaded, None);
        assert_eq!(ws.failed_checkpoints(), cps(&[5, 3]));
    }

    #[tokio::test]
    async fn fresh_start_is_attempted_once() {
        let config = WorkspaceConfig::new("idx").with_fresh_start_on_exhaustion(true);
        let (_store, ws) = open_with(&[5], config).await;
        let mut calls = 0;
        let err = ws
            .with_checkpoints(|| {
                calls += 1;
                async { Err::<(), _>(StorageError::storage("idx", "unreadable")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RecoveryExhausted { .. }));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn usage_errors_skip_rollback() {
        let (_store, ws) = open(&[5, 3]).await;
        let err = ws
            .with_checkpoints(|| async { Err::<(), _>(StorageError::usage("bad call")) })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidUsage(_)));
        assert!(ws.failed_checkpoints().is_empty());
        assert_eq!(ws.load_checkpoint(), Some(Checkpoint::new(5)));
    }

    #[tokio::test]
    async fn timed_out_load_rolls_back() {
        let config = WorkspaceConfig::new("idx").with_load_timeout(Duration::from_millis(50));
        let (_store, ws) = open_with(&[5, 3], config).await;
        let ws_ref = &*ws;
        let loaded = ws
            .with_checkpoints(move || async move {
                let cp = ws_ref.load_checkpoint();
                if cp == Some(Checkpoint::new(5)) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(cp)
            })
            .await
            .unwrap();
        assert_eq!(loaded, Some(Checkpoint::new(3)));
        assert_eq!(ws.failed_checkpoints(), cps(&[5]));
    }

    #[tokio::test]
    async fn save_path_waits_for_recovery() {
        let (_store, ws) = open(&[5]).await;
        let ws_ref = &*ws;
        let err = ws
            .with_checkpoints(move || async move { ws_ref.save_path() })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidUsage(_)));

        // The flag is cleared once the pass is over.
        assert!(ws.save_path().is_ok());
    }

    #[tokio::test]
    async fn one_recovery_at_a_time() {
        let (_store, ws) = open(&[5]).await;
        let recovery = ws.recovery().unwrap();
        assert_eq!(recovery.current(), Some(Checkpoint::new(5)));
        assert!(matches!(ws.recovery(), Err(StorageError::InvalidUsage(_))));
        drop(recovery);
        assert!(ws.recovery().is_ok());
    }

    #[tokio::test]
    async fn manual_recovery_loop() {
        let (_store, ws) = open(&[9, 7]).await;
        let mut recovery = ws.recovery().unwrap();
        let first: StorageResult<()> = recovery.attempt(async { Err(corrupt(None)) }).await;
        recovery.fail(first.unwrap_err()).unwrap();
        assert_eq!(recovery.current(), Some(Checkpoint::new(7)));
        let second = recovery.attempt(async { Ok(7) }).await.unwrap();
        assert_eq!(second, 7);
        assert_eq!(recovery.attempts(), 2);
    }

    #[tokio::test]
    async fn recovery_rejected_after_close() {
        let (_store, ws) = open(&[5]).await;
        ws.close().await;
        assert!(matches!(ws.recovery(), Err(StorageError::InvalidUsage(_))));
    }
}
