use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use strata_workspace::{CloseReport, Namespace, StorageError, StorageResult, Workspace};
use tracing::{info, warn};

use crate::store::{Lifecycle, Phase};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Insert,
    Query,
}

/// Drives a set of resource stores through their lifecycle together.
///
/// Starting loads every store concurrently against the same checkpoint. If
/// any store fails, all of them are aborted and the whole set is retried
/// against the next older checkpoint, so the stores never mix state from
/// different checkpoints. Finishing an insert writes every store back and
/// then commits the save checkpoint once, so a crash in between leaves a
/// checkpoint that later loads skip.
#[derive(Clone, Debug)]
pub struct StateManager {
    workspace: Arc<Workspace>,
}

impl StateManager {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn namespace(&self, name: impl Into<String>) -> Namespace {
        self.workspace.namespace(name)
    }

    pub async fn insert_start(&self, stores: &mut [&mut dyn Lifecycle]) -> StorageResult<()> {
        self.start(stores, Mode::Insert).await
    }

    pub async fn query_start(&self, stores: &mut [&mut dyn Lifecycle]) -> StorageResult<()> {
        self.start(stores, Mode::Query).await
    }

    /// Persist every store, then commit the save checkpoint. All stores are
    /// finished even if one fails; the first error is returned and nothing
    /// is committed.
    pub async fn insert_done(&self, stores: &mut [&mut dyn Lifecycle]) -> StorageResult<()> {
        let results = join_all(stores.iter_mut().map(|store| store.write_back())).await;
        first_error(results)?;
        self.workspace.commit().await?;
        Ok(())
    }

    /// Release every store. The first error is returned.
    pub async fn query_done(&self, stores: &mut [&mut dyn Lifecycle]) -> StorageResult<()> {
        let results = join_all(stores.iter_mut().map(|store| store.query_done())).await;
        first_error(results)
    }

    /// Close the underlying workspace.
    pub async fn close(&self) -> CloseReport {
        self.workspace.close().await
    }

    async fn start(&self, stores: &mut [&mut dyn Lifecycle], mode: Mode) -> StorageResult<()> {
        if let Some(busy) = stores.iter().find(|store| store.phase() != Phase::Idle) {
            let operation = match mode {
                Mode::Insert => "insert_start",
                Mode::Query => "query_start",
            };
            return Err(StorageError::usage(format!(
                "cannot {operation} while {} is {}",
                busy.resource(),
                busy.phase()
            )));
        }
        let mut recovery = self.workspace.recovery()?;
        loop {
            let loads = stores.iter_mut().map(|store| match mode {
                Mode::Insert => store.insert_start(),
                Mode::Query => store.query_start(),
            });
            match recovery.attempt(try_join_all(loads)).await {
                Ok(_) => {
                    info!(
                        stores = stores.len(),
                        checkpoint = ?recovery.current(),
                        mode = ?mode,
                        "stores loaded"
                    );
                    return Ok(());
                }
                Err(err) => {
                    warn!(stores = stores.len(), error = %err, "aborting partially loaded stores");
                    for store in stores.iter_mut() {
                        store.abort();
                    }
                    recovery.fail(err)?;
                }
            }
        }
    }
}

fn first_error(results: Vec<StorageResult<()>>) -> StorageResult<()> {
    results.into_iter().collect::<StorageResult<Vec<()>>>().map(|_| ())
}
