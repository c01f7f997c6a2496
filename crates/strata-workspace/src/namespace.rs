use std::sync::Arc;

use strata_blob::BlobStore;
use strata_types::path::resource_key;
use strata_types::{validate_namespace_name, validate_resource_name};

use crate::error::StorageResult;
use crate::workspace::Workspace;

/// A named partition of a [`Workspace`].
///
/// Resources of a namespace live next to each other in every checkpoint
/// directory as `{namespace}_{resource}`. Cloning is cheap; all clones share
/// the workspace and therefore the same load and save checkpoints.
#[derive(Clone, Debug)]
pub struct Namespace {
    workspace: Arc<Workspace>,
    name: String,
}

impl Namespace {
    pub(crate) fn new(workspace: Arc<Workspace>, name: impl Into<String>) -> Self {
        Self {
            workspace,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// The blob store shared with the workspace.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        self.workspace.store()
    }

    /// Key to load `resource` from, or `None` when there is nothing to load.
    pub async fn load_path(&self, resource: &str) -> StorageResult<Option<String>> {
        self.validate(resource)?;
        let dir = self.workspace.load_path().await?;
        Ok(dir.map(|dir| resource_key(&dir, &self.name, resource)))
    }

    /// Key to save `resource` to.
    pub fn save_path(&self, resource: &str) -> StorageResult<String> {
        self.validate(resource)?;
        let dir = self.workspace.save_path()?;
        Ok(resource_key(&dir, &self.name, resource))
    }

    fn validate(&self, resource: &str) -> StorageResult<()> {
        validate_namespace_name(&self.name)?;
        validate_resource_name(resource)?;
        Ok(())
    }
}
