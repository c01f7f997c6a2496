//! Blob store adapter for Strata.
//!
//! Everything Strata persists goes through the [`BlobStore`] trait: a flat
//! key space of `/`-separated paths offering only exists / list / read /
//! write / delete / rename. Remote object stores provide nothing more, so
//! the checkpoint layer above is built on exactly these primitives.
//!
//! # Backends
//!
//! - [`InMemoryBlobStore`] -- `BTreeMap`-based store with fault injection,
//!   for tests and embedding
//! - [`FsBlobStore`] -- local directory with atomic writes
//!
//! # Design Rules
//!
//! 1. Directories are prefixes; they exist while a blob lives under them.
//! 2. `delete` and `rename` of an absent path are no-ops.
//! 3. The store never interprets blob contents.
//! 4. No locking: isolation between writers is by path prefix only.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{BlobError, BlobResult};
pub use fs::FsBlobStore;
pub use memory::{BlobOp, InMemoryBlobStore};
pub use traits::BlobStore;
