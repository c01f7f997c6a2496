use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_workspace::{StorageError, StorageResult};

use crate::snapshot::{Snapshot, SnapshotKind};
use crate::store::ResourceStore;

/// Vector resource store.
pub type VectorStore = ResourceStore<VectorIndex>;

/// Embeddings keyed by id, all of the same dimension.
///
/// The dimension is fixed by the first upsert and kept for the lifetime of
/// the index, even if every vector is later removed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: Option<usize>,
    vectors: BTreeMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Insert or replace the vector for `id`.
    pub fn upsert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> StorageResult<()> {
        if vector.is_empty() {
            return Err(StorageError::usage("vector must not be empty"));
        }
        match self.dimension {
            Some(dimension) if dimension != vector.len() => {
                return Err(StorageError::usage(format!(
                    "vector has dimension {}, index expects {dimension}",
                    vector.len()
                )));
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }
        self.vectors.insert(id.into(), vector);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    pub fn remove(&mut self, id: &str) -> Option<Vec<f32>> {
        self.vectors.remove(id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }

    /// The `k` vectors most similar to `query` by cosine similarity, best
    /// first. Ties are broken by id.
    pub fn nearest(&self, query: &[f32], k: usize) -> StorageResult<Vec<(&str, f32)>> {
        if let Some(dimension) = self.dimension {
            if query.len() != dimension {
                return Err(StorageError::usage(format!(
                    "query has dimension {}, index expects {dimension}",
                    query.len()
                )));
            }
        }
        let mut scored: Vec<(&str, f32)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (id.as_str(), cosine(query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl Snapshot for VectorIndex {
    const KIND: SnapshotKind = SnapshotKind::Vector;
    const RESOURCE: &'static str = "vectors.bin";

    fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
