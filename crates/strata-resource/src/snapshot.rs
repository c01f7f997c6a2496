use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Storage kind recorded in every frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Vector,
    Graph,
    KeyValue,
    Blob,
}

impl SnapshotKind {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Vector => 1,
            Self::Graph => 2,
            Self::KeyValue => 3,
            Self::Blob => 4,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Vector),
            2 => Some(Self::Graph),
            3 => Some(Self::KeyValue),
            4 => Some(Self::Blob),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector => write!(f, "vector"),
            Self::Graph => write!(f, "graph"),
            Self::KeyValue => write!(f, "key-value"),
            Self::Blob => write!(f, "blob"),
        }
    }
}

/// In-memory state of one resource, persisted as a single frame.
///
/// `Default` is the state of a resource that has never been saved.
pub trait Snapshot: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Kind tag written into the frame header.
    const KIND: SnapshotKind;

    /// Resource name used when a store is not given one explicitly.
    const RESOURCE: &'static str;

    /// `true` if there is nothing worth persisting.
    fn is_empty(&self) -> bool;
}
