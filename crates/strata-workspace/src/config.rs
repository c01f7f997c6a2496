use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_types::Checkpoint;

use crate::error::{StorageError, StorageResult};

/// Environment variable overriding [`WorkspaceConfig::root`].
pub const ENV_WORKING_ROOT: &str = "STRATA_WORKING_ROOT";
/// Environment variable overriding [`WorkspaceConfig::checkpoint`].
pub const ENV_CHECKPOINT: &str = "STRATA_CHECKPOINT";
/// Environment variable overriding [`WorkspaceConfig::retention`].
pub const ENV_RETENTION: &str = "STRATA_RETENTION";

/// Configuration for opening a [`crate::Workspace`].
///
/// ```toml
/// root = "dev/alice"
/// retention = 3
/// load_timeout_ms = 30000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Path prefix of the workspace inside the blob store.
    pub root: String,
    /// Checkpoint to load first; `0` means "newest available".
    pub checkpoint: u64,
    /// Historical checkpoints kept on close; `0` always overwrites the
    /// live location.
    pub retention: usize,
    /// Upper bound for a single load attempt during recovery.
    pub load_timeout_ms: Option<u64>,
    /// When every checkpoint fails, make one last attempt with no load
    /// target (all resources start empty) instead of failing outright.
    pub start_fresh_on_exhaustion: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: "strata".into(),
            checkpoint: 0,
            retention: 0,
            load_timeout_ms: None,
            start_fresh_on_exhaustion: false,
        }
    }
}

impl WorkspaceConfig {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = checkpoint.value();
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_fresh_start_on_exhaustion(mut self, enabled: bool) -> Self {
        self.start_fresh_on_exhaustion = enabled;
        self
    }

    /// The requested checkpoint as a typed id.
    pub fn requested_checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.checkpoint)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Override fields from `STRATA_*` environment variables.
    pub fn apply_env(self) -> StorageResult<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable source.
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        if let Some(root) = lookup(ENV_WORKING_ROOT) {
            self.root = root;
        }
        if let Some(raw) = lookup(ENV_CHECKPOINT) {
            self.checkpoint = raw
                .trim()
                .parse()
                .map_err(|_| StorageError::Config(format!("{ENV_CHECKPOINT}: {raw:?} is not a checkpoint")))?;
        }
        if let Some(raw) = lookup(ENV_RETENTION) {
            self.retention = raw
                .trim()
                .parse()
                .map_err(|_| StorageError::Config(format!("{ENV_RETENTION}: {raw:?} is not a count")))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that the root is a usable blob path.
    pub fn validate(&self) -> StorageResult<()> {
        strata_types::validate_blob_path(self.root.trim_end_matches('/'))
            .map_err(|e| StorageError::Config(format!("root: {e}")))?;
        if self.load_timeout_ms == Some(0) {
            return Err(StorageError::Config("load_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
