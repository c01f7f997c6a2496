//! Checkpoint management for Strata.
//!
//! A [`Workspace`] owns one working root inside a [`strata_blob::BlobStore`]
//! and decides where state is loaded from and where it is saved to:
//!
//! ```text
//! {root}/                         live checkpoint (0)
//! {root}/{checkpoint}/            immutable snapshot, checkpoint > 0
//! {root}/0__err_{checkpoint}/     snapshot that failed to load
//! {dir}/{namespace}_{resource}    one persisted resource
//! ```
//!
//! Loads go through [`Workspace::with_checkpoints`] (or a manual
//! [`Recovery`] pass), which rolls back to older checkpoints until one
//! loads. Saves always target a single save checkpoint assigned once per
//! workspace. [`Workspace::close`] marks failed checkpoints and applies the
//! retention policy.

pub mod config;
pub mod error;
pub mod namespace;
pub mod recovery;
pub mod workspace;

pub use config::WorkspaceConfig;
pub use error::{BoxError, StorageError, StorageResult};
pub use namespace::Namespace;
pub use recovery::Recovery;
pub use workspace::{discover_checkpoints, CloseReport, Rollback, Workspace};

pub use strata_types::Checkpoint;
