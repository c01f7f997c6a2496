//! Two-phase resource stores for Strata.
//!
//! A resource is one persisted value of a [`strata_workspace::Namespace`],
//! stored as a single framed snapshot at `{dir}/{namespace}_{resource}`.
//! Every store follows the same lifecycle:
//!
//! ```text
//! Idle --insert_start--> LoadedForInsert --insert_done--> Idle   (writes)
//! Idle --query_start---> LoadedForQuery  --query_done---> Idle   (no writes)
//! ```
//!
//! # Variants
//!
//! - [`VectorStore`] -- fixed-dimension embeddings with cosine lookup
//! - [`GraphStore`] -- nodes and edges with attributes
//! - [`KeyValueStore`] -- key-value table with stable integer indices
//! - [`BlobStorage`] -- a single optional value
//!
//! [`StateManager`] loads several stores against the same checkpoint and
//! rolls all of them back together when any one fails to load. It commits
//! a versioned save checkpoint only after every store has been written.

pub mod blob;
pub mod error;
pub mod frame;
pub mod graph;
pub mod kv;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod vector;

pub use blob::{BlobCell, BlobStorage};
pub use error::{FrameError, FrameResult};
pub use frame::{Compression, FrameHeader};
pub use graph::{Attributes, Edge, Graph, GraphStore};
pub use kv::{IndexedTable, KeyValueStore};
pub use snapshot::{Snapshot, SnapshotKind};
pub use state::StateManager;
pub use store::{Lifecycle, Phase, ResourceStore};
pub use vector::{VectorIndex, VectorStore};
