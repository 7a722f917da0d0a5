//! A* route search over a published proximity graph
//!
//! Query points are snapped to the closest node by exhaustive scan, then a
//! standard A* runs over the node arena. Edge weights and the heuristic both
//! come from the same [`Metric`], so the heuristic never overstates the
//! remaining cost and the returned route is a shortest one.
//!
//! Per-search scores and parent links live in a scratch arena owned by the
//! call, never in the graph. Any number of searches may therefore run on the
//! same `Arc<Graph>` at once.
//!
//! The search gives up after a fixed number of node expansions. On a
//! connected graph of reasonable size this never triggers; on disconnected
//! or pathological graphs it bounds the work done per frame.

use crate::config::PathConfig;
use crate::error::Result;
use crate::geo::Metric;
use crate::graph::Graph;
use crate::types::{EntityId, GeoCoords};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Default bound on node expansions per search
pub const DEFAULT_ITERATION_CAP: usize = 10_000;

/// One node on a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteHop {
    pub id: EntityId,
    pub position: GeoCoords,
}

/// Result of a successful search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Nodes in traversal order, ending at the goal node
    pub hops: Vec<RouteHop>,
    /// Total edge cost from the start node to the goal node in km
    pub cost: f64,
    /// Node that the start point snapped to
    pub start: EntityId,
    /// Node that the goal point snapped to
    pub goal: EntityId,
    /// Nodes expanded by the search
    pub expansions: usize,
}

impl Route {
    /// Number of hops
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Whether the route has no hops (start and goal snapped to the same node)
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Entity ids along the route
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.hops.iter().map(|hop| hop.id)
    }

    /// Serialize for an external renderer
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Per-node scratch state for one search
#[derive(Debug, Clone, Copy)]
struct Score {
    g: f64,
    f: f64,
    parent: Option<usize>,
    open: bool,
    closed: bool,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            g: f64::INFINITY,
            f: f64::INFINITY,
            parent: None,
            open: false,
            closed: false,
        }
    }
}

/// Open-set entry; ordered so that `BinaryHeap` pops the lowest `f` first
/// and, among equal `f`, the entry pushed first.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A* search over a [`Graph`]
#[derive(Debug, Clone)]
pub struct PathFinder<M> {
    metric: M,
    iteration_cap: usize,
    include_start_node: bool,
}

impl<M: Metric> PathFinder<M> {
    /// Path finder with the default expansion cap, omitting the start node from routes
    pub fn new(metric: M) -> Self {
        Self {
            metric,
            iteration_cap: DEFAULT_ITERATION_CAP,
            include_start_node: false,
        }
    }

    /// Path finder configured from [`PathConfig`]
    pub fn from_config(metric: M, config: &PathConfig) -> Self {
        Self::new(metric)
            .with_iteration_cap(config.iteration_cap)
            .with_start_node(config.include_start_node)
    }

    pub fn with_iteration_cap(mut self, cap: usize) -> Self {
        self.iteration_cap = cap;
        self
    }

    /// Whether routes begin with the start node itself
    pub fn with_start_node(mut self, include: bool) -> Self {
        self.include_start_node = include;
        self
    }

    pub fn iteration_cap(&self) -> usize {
        self.iteration_cap
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Shortest route between the nodes closest to `start` and `goal`
    ///
    /// Returns `None` if the graph is empty, the goal is unreachable, or the
    /// expansion cap is hit first.
    pub fn find_path(&self, graph: &Graph, start: &GeoCoords, goal: &GeoCoords) -> Option<Route> {
        let start_index = graph.nearest(start, &self.metric)?;
        let goal_index = graph.nearest(goal, &self.metric)?;
        self.search(graph, start_index, goal_index)
    }

    /// Shortest route between two entities of the graph
    pub fn find_path_between(&self, graph: &Graph, from: EntityId, to: EntityId) -> Option<Route> {
        let start_index = graph.index_of(from)?;
        let goal_index = graph.index_of(to)?;
        self.search(graph, start_index, goal_index)
    }

    fn search(&self, graph: &Graph, start: usize, goal: usize) -> Option<Route> {
        let nodes = graph.nodes();
        let goal_position = nodes[goal].position;

        let mut scores = vec![Score::default(); nodes.len()];
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;

        scores[start].g = 0.0;
        scores[start].f = 0.0;
        scores[start].open = true;
        open.push(OpenEntry {
            f: 0.0,
            seq,
            node: start,
        });

        let mut expansions = 0usize;
        while let Some(entry) = open.pop() {
            let current = entry.node;
            // Superseded entry: the node was reached more cheaply or already expanded
            if scores[current].closed || entry.f > scores[current].f {
                continue;
            }
            if expansions >= self.iteration_cap {
                tracing::debug!(
                    "Route search stopped after {} expansions ({} -> {})",
                    expansions,
                    nodes[start].id,
                    nodes[goal].id
                );
                return None;
            }

            scores[current].open = false;
            scores[current].closed = true;

            if current == goal {
                return Some(self.reconstruct(graph, &scores, start, goal, expansions));
            }

            let current_position = nodes[current].position;
            let current_g = scores[current].g;
            for &neighbor in nodes[current].connections() {
                if scores[neighbor].closed {
                    continue;
                }
                let neighbor_position = &nodes[neighbor].position;
                let g = current_g + self.metric.distance(&current_position, neighbor_position);
                let f = g + self.metric.distance(neighbor_position, &goal_position);

                let score = &mut scores[neighbor];
                if !score.open || f < score.f {
                    score.g = g;
                    score.f = f;
                    score.parent = Some(current);
                    score.open = true;
                    seq += 1;
                    open.push(OpenEntry {
                        f,
                        seq,
                        node: neighbor,
                    });
                }
            }
            expansions += 1;
        }

        tracing::trace!(
            "No route from {} to {} ({} expansions)",
            nodes[start].id,
            nodes[goal].id,
            expansions
        );
        None
    }

    fn reconstruct(
        &self,
        graph: &Graph,
        scores: &[Score],
        start: usize,
        goal: usize,
        expansions: usize,
    ) -> Route {
        let nodes = graph.nodes();
        let hop = |i: usize| RouteHop {
            id: nodes[i].id,
            position: nodes[i].position,
        };

        let mut hops = Vec::new();
        let mut current = goal;
        while let Some(parent) = scores[current].parent {
            hops.push(hop(current));
            current = parent;
        }
        if self.include_start_node {
            hops.push(hop(start));
        }
        hops.reverse();

        Route {
            hops,
            cost: scores[goal].g,
            start: nodes[start].id,
            goal: nodes[goal].id,
            expansions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entity;
    use proptest::prelude::*;

    /// Flat metric over (lng, lat) treated as km
    #[derive(Debug, Clone, Copy)]
    struct Planar;

    impl Metric for Planar {
        fn distance(&self, a: &GeoCoords, b: &GeoCoords) -> f64 {
            ((a.lat - b.lat).powi(2) + (a.lng - b.lng).powi(2)).sqrt()
        }
    }

    fn at(x: f64, y: f64) -> GeoCoords {
        GeoCoords::new(y, x, 0.0)
    }

    fn graph(points: &[(f64, f64)], edges: &[(usize, usize)]) -> Graph {
        let entities: Vec<Entity> = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Entity::at(i as u32, at(x, y)))
            .collect();
        let mut adjacency = vec![Vec::new(); points.len()];
        for &(a, b) in edges {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        Graph::from_adjacency(&entities, adjacency)
    }

    /// Square with a long detour: 0-1-2 direct vs 0-3-4-2
    fn detour_graph() -> Graph {
        graph(
            &[(0.0, 0.0), (5.0, 1.0), (10.0, 0.0), (0.0, 8.0), (10.0, 8.0)],
            &[(0, 1), (1, 2), (0, 3), (3, 4), (4, 2)],
        )
    }

    fn ids(route: &Route) -> Vec<u32> {
        route.ids().map(|id| id.0).collect()
    }

    #[test]
    fn test_shortest_route_omits_start() {
        let finder = PathFinder::new(Planar);
        let route = finder
            .find_path(&detour_graph(), &at(-1.0, 0.0), &at(11.0, 0.0))
            .unwrap();
        assert_eq!(ids(&route), vec![1, 2]);
        assert_eq!(route.start, EntityId(0));
        assert_eq!(route.goal, EntityId(2));
        let expected = 2.0 * 26f64.sqrt();
        assert!((route.cost - expected).abs() < 1e-9);
    }

    #[test]
    fn test_route_with_start_node() {
        let finder = PathFinder::new(Planar).with_start_node(true);
        let route = finder
            .find_path(&detour_graph(), &at(0.0, 0.0), &at(10.0, 0.0))
            .unwrap();
        assert_eq!(ids(&route), vec![0, 1, 2]);
    }

    #[test]
    fn test_start_equals_goal() {
        let g = detour_graph();
        let route = PathFinder::new(Planar)
            .find_path(&g, &at(5.0, 1.0), &at(5.2, 1.1))
            .unwrap();
        assert!(route.is_empty());
        assert_eq!(route.cost, 0.0);

        let route = PathFinder::new(Planar)
            .with_start_node(true)
            .find_path(&g, &at(5.0, 1.0), &at(5.2, 1.1))
            .unwrap();
        assert_eq!(ids(&route), vec![1]);
    }

    #[test]
    fn test_empty_graph_has_no_route() {
        let finder = PathFinder::new(Planar);
        assert!(finder
            .find_path(&Graph::empty(), &at(0.0, 0.0), &at(1.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_disconnected_components() {
        let g = graph(
            &[(0.0, 0.0), (1.0, 0.0), (50.0, 0.0), (51.0, 0.0)],
            &[(0, 1), (2, 3)],
        );
        let finder = PathFinder::new(Planar);
        assert!(finder.find_path(&g, &at(0.0, 0.0), &at(51.0, 0.0)).is_none());
        assert!(finder.find_path(&g, &at(0.0, 0.0), &at(1.0, 0.0)).is_some());
    }

    #[test]
    fn test_asymmetric_edge_is_directed() {
        let entities = vec![Entity::at(0u32, at(0.0, 0.0)), Entity::at(1u32, at(1.0, 0.0))];
        let g = Graph::from_adjacency(&entities, vec![vec![1], vec![]]);
        let finder = PathFinder::new(Planar);

        let forward = finder.find_path_between(&g, EntityId(0), EntityId(1)).unwrap();
        assert_eq!(ids(&forward), vec![1]);
        assert!(finder.find_path_between(&g, EntityId(1), EntityId(0)).is_none());
    }

    #[test]
    fn test_iteration_cap_bounds_search() {
        // Long chain: reaching the end takes one expansion per node
        let points: Vec<(f64, f64)> = (0..50).map(|i| (i as f64, 0.0)).collect();
        let edges: Vec<(usize, usize)> = (0..49).map(|i| (i, i + 1)).collect();
        let g = graph(&points, &edges);

        let capped = PathFinder::new(Planar).with_iteration_cap(10);
        assert!(capped.find_path(&g, &at(0.0, 0.0), &at(49.0, 0.0)).is_none());

        let route = PathFinder::new(Planar)
            .find_path(&g, &at(0.0, 0.0), &at(49.0, 0.0))
            .unwrap();
        assert_eq!(route.len(), 49);
        assert_eq!(route.expansions, 49);
    }

    #[test]
    fn test_from_config() {
        let config = PathConfig {
            iteration_cap: 42,
            include_start_node: true,
        };
        let finder = PathFinder::from_config(Planar, &config);
        assert_eq!(finder.iteration_cap(), 42);
        let route = finder
            .find_path(&detour_graph(), &at(0.0, 0.0), &at(10.0, 0.0))
            .unwrap();
        assert_eq!(route.hops.first().map(|h| h.id), Some(EntityId(0)));
    }

    #[test]
    fn test_route_json_export() {
        let route = PathFinder::new(Planar)
            .find_path(&detour_graph(), &at(0.0, 0.0), &at(10.0, 0.0))
            .unwrap();
        let json = route.to_json().unwrap();
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(back, route);
        assert_eq!(back.cost.to_bits(), route.cost.to_bits());
    }

    /// Reference shortest-path cost by Dijkstra with a linear scan
    fn dijkstra(g: &Graph, start: usize, goal: usize) -> Option<f64> {
        let n = g.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut done = vec![false; n];
        dist[start] = 0.0;
        loop {
            let next = (0..n)
                .filter(|&i| !done[i] && dist[i].is_finite())
                .min_by(|&a, &b| dist[a].total_cmp(&dist[b]))?;
            if next == goal {
                return Some(dist[goal]);
            }
            done[next] = true;
            let from = g.node(next)?;
            for &j in from.connections() {
                let to = g.node(j)?;
                let d = dist[next] + Planar.distance(&from.position, &to.position);
                if d < dist[j] {
                    dist[j] = d;
                }
            }
        }
    }

    proptest! {
        #[test]
        fn test_astar_matches_dijkstra(
            points in prop::collection::vec((0.0f64..100.0, 0.0f64..100.0), 2..20),
            threshold in 10.0f64..60.0,
            from in 0usize..20,
            to in 0usize..20,
        ) {
            let n = points.len();
            let mut edges = Vec::new();
            for i in 0..n {
                for j in (i + 1)..n {
                    let (xi, yi) = points[i];
                    let (xj, yj) = points[j];
                    if ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt() < threshold {
                        edges.push((i, j));
                    }
                }
            }
            let g = graph(&points, &edges);
            let start = g.node(from % n).unwrap().position;
            let goal = g.node(to % n).unwrap().position;
            let start_index = g.nearest(&start, &Planar).unwrap();
            let goal_index = g.nearest(&goal, &Planar).unwrap();

            let route = PathFinder::new(Planar).find_path(&g, &start, &goal);
            let expected = dijkstra(&g, start_index, goal_index);

            match (route, expected) {
                (Some(route), Some(cost)) => prop_assert!((route.cost - cost).abs() < 1e-6),
                (None, None) => {}
                (route, expected) => prop_assert!(false, "A* {:?} vs Dijkstra {:?}", route.map(|r| r.cost), expected),
            }
        }
    }
}
