//! Core types shared by every Strata crate.
//!
//! Strata persists the state of a knowledge index (vectors, graph,
//! key-value tables, opaque blobs) as numbered checkpoints inside a blob
//! store. This crate holds the vocabulary the other crates agree on:
//!
//! - [`Checkpoint`] -- a numeric snapshot generation; `0` is the live root
//! - [`path`] -- the literal key layout inside the blob store
//! - [`names`] -- validation for namespace, resource and blob path names
//!
//! # Path Scheme
//!
//! ```text
//! {root}                          checkpoint 0 (live, unversioned)
//! {root}/{checkpoint}             a point-in-time snapshot
//! {dir}/{namespace}_{resource}    one persisted resource
//! {root}/{checkpoint}/.committed  written once the checkpoint is complete
//! {root}/0__err_{checkpoint}      a checkpoint that failed to load
//! ```

pub mod checkpoint;
pub mod error;
pub mod names;
pub mod path;

pub use checkpoint::Checkpoint;
pub use error::{NameError, NameResult};
pub use names::{validate_blob_path, validate_namespace_name, validate_resource_name};
pub use path::{COMMIT_MARKER, FAILED_MARKER_PREFIX};
