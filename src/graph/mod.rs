//! Proximity graph
//!
//! A [`Graph`] is an immutable snapshot: one [`GraphNode`] per entity, each
//! holding the indices of the nodes that were within the proximity threshold
//! when the snapshot was built. Nodes live in an arena (`Vec`) and refer to
//! each other by index, so there are no reference cycles to manage.
//!
//! Adjacency is computed per node without a symmetry pass. Two nodes whose
//! distance sits exactly on the threshold may therefore link in one
//! direction only; consumers treat every connection as a directed edge.
//!
//! Snapshots are produced by [`ProximityGraphBuilder`] and published as
//! `Arc<Graph>`, so a reader keeps a complete graph for as long as it holds
//! the `Arc`, no matter how many rebuilds happen meanwhile.

mod builder;

pub use builder::ProximityGraphBuilder;

use crate::geo::Metric;
use crate::types::{EntityId, GeoCoords, Tracked};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entity in a graph snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Entity identifier
    pub id: EntityId,
    /// Entity position at build time
    pub position: GeoCoords,
    connections: Vec<usize>,
}

impl GraphNode {
    fn new(id: EntityId, position: GeoCoords) -> Self {
        Self {
            id,
            position,
            connections: Vec::new(),
        }
    }

    /// Indices of connected nodes
    pub fn connections(&self) -> &[usize] {
        &self.connections
    }

    /// Number of outgoing connections
    pub fn degree(&self) -> usize {
        self.connections.len()
    }
}

/// A directed connection between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: EntityId,
    pub to: EntityId,
}

/// Immutable proximity graph snapshot
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    index: HashMap<EntityId, usize>,
    build: u64,
}

impl Graph {
    /// The empty graph published before the first build completes
    pub fn empty() -> Self {
        Self::default()
    }

    /// Graph with one edge-less node per entity
    pub(crate) fn with_nodes<T: Tracked>(entities: &[T], build: u64) -> Self {
        let mut nodes = Vec::with_capacity(entities.len());
        let mut index = HashMap::with_capacity(entities.len());
        let mut duplicates = 0usize;

        for (i, entity) in entities.iter().enumerate() {
            let id = entity.id();
            nodes.push(GraphNode::new(id, entity.position()));
            if index.insert(id, i).is_some() {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            tracing::warn!(
                "Graph build {} has {} duplicate entity ids; lookups resolve to the last occurrence",
                build,
                duplicates
            );
        }

        Self {
            nodes,
            index,
            build,
        }
    }

    /// Build a graph from entities and per-node adjacency (indices into `entities`)
    ///
    /// Out-of-range indices are ignored. Missing adjacency rows mean no edges.
    pub fn from_adjacency<T: Tracked>(entities: &[T], adjacency: Vec<Vec<usize>>) -> Self {
        let mut graph = Self::with_nodes(entities, 0);
        graph.set_adjacency(adjacency);
        graph
    }

    pub(crate) fn set_adjacency(&mut self, adjacency: Vec<Vec<usize>>) {
        let len = self.nodes.len();
        for (node, mut connections) in self.nodes.iter_mut().zip(adjacency) {
            connections.retain(|&j| j < len);
            node.connections = connections;
        }
    }

    /// Sequence number of the build round that produced this snapshot (0 for the initial graph)
    pub fn build(&self) -> u64 {
        self.build
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in entity order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Node by arena index
    pub fn node(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    /// Arena index of an entity
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Node for an entity
    pub fn get(&self, id: EntityId) -> Option<&GraphNode> {
        self.index_of(id).and_then(|i| self.nodes.get(i))
    }

    /// Identifiers of the entities `id` connects to
    pub fn neighbors(&self, id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(move |node| node.connections.iter().map(move |&j| self.nodes[j].id))
    }

    /// Total number of directed edges
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(GraphNode::degree).sum()
    }

    /// All directed edges
    pub fn links(&self) -> impl Iterator<Item = Link> + '_ {
        self.nodes.iter().flat_map(move |node| {
            node.connections.iter().map(move |&j| Link {
                from: node.id,
                to: self.nodes[j].id,
            })
        })
    }

    /// Edges with each symmetric pair reported once, for drawing
    pub fn undirected_links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            for &j in &node.connections {
                let reverse_exists = self.nodes[j].connections.contains(&i);
                if i < j || !reverse_exists {
                    links.push(Link {
                        from: node.id,
                        to: self.nodes[j].id,
                    });
                }
            }
        }
        links
    }

    /// Index of the node closest to `point`, by exhaustive scan
    pub fn nearest<M: Metric + ?Sized>(&self, point: &GeoCoords, metric: &M) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            let d = metric.distance(point, &node.position);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}
