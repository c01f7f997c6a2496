use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strata_workspace::{StorageError, StorageResult};

use crate::snapshot::{Snapshot, SnapshotKind};
use crate::store::ResourceStore;

/// Graph resource store.
pub type GraphStore = ResourceStore<Graph>;

/// Free-form attributes attached to nodes and edges.
pub type Attributes = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub attributes: Attributes,
}

/// An undirected multigraph of named nodes.
///
/// Edges may only connect existing nodes; removing a node removes every
/// edge touching it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    nodes: BTreeMap<String, Attributes>,
    edges: Vec<Edge>,
}

impl Graph {
    /// Insert a node or replace its attributes. Edges are kept.
    pub fn upsert_node(&mut self, id: impl Into<String>, attributes: Attributes) {
        self.nodes.insert(id.into(), attributes);
    }

    /// Add an edge between two existing nodes. Returns its position.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        relation: impl Into<String>,
        attributes: Attributes,
    ) -> StorageResult<usize> {
        for endpoint in [source, target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(StorageError::usage(format!(
                    "edge endpoint {endpoint:?} is not a node"
                )));
            }
        }
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.into(),
            attributes,
        });
        Ok(self.edges.len() - 1)
    }

    /// Remove a node and its incident edges.
    pub fn remove_node(&mut self, id: &str) -> Option<Attributes> {
        let attributes = self.nodes.remove(id)?;
        self.edges.retain(|edge| edge.source != id && edge.target != id);
        Some(attributes)
    }

    pub fn node(&self, id: &str) -> Option<&Attributes> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Distinct nodes sharing an edge with `id`, sorted.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut found = BTreeSet::new();
        for edge in &self.edges {
            if edge.source == id {
                found.insert(edge.target.as_str());
            }
            if edge.target == id {
                found.insert(edge.source.as_str());
            }
        }
        found.into_iter().collect()
    }

    /// Edges touching `id`.
    pub fn edges_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |edge| edge.source == id || edge.target == id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl Snapshot for Graph {
    const KIND: SnapshotKind = SnapshotKind::Graph;
    const RESOURCE: &'static str = "graph.bin";

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
