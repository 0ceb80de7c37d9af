//! Edge graph wrapper using petgraph::StableDiGraph keyed by file path

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::model::{EdgeKind, GraphEdge};

/// The full dependency graph of the backend's edge list.
///
/// Used for queries the bounded assembler deliberately does not answer,
/// such as multi-hop reachability.
pub struct EdgeGraph {
    inner: StableDiGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for EdgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl EdgeGraph {
    pub fn new() -> Self {
        EdgeGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_edges(edges: &[GraphEdge]) -> Self {
        let mut graph = EdgeGraph::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Add a path if missing. Returns its index.
    pub fn add_node(&mut self, path: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.inner.add_node(path.to_string());
        self.index.insert(path.to_string(), idx);
        idx
    }

    pub fn add_edge(&mut self, edge: &GraphEdge) {
        let source = self.add_node(&edge.source);
        let target = self.add_node(&edge.target);
        self.inner.add_edge(source, target, edge.kind);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Paths that import `path`.
    pub fn importers(&self, path: &str) -> Vec<&str> {
        self.directed_neighbors(path, Direction::Incoming)
    }

    /// Paths that `path` imports.
    pub fn imports(&self, path: &str) -> Vec<&str> {
        self.directed_neighbors(path, Direction::Outgoing)
    }

    fn directed_neighbors(&self, path: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.inner
            .edges_directed(idx, direction)
            .map(|edge_ref| match direction {
                Direction::Incoming => edge_ref.source(),
                Direction::Outgoing => edge_ref.target(),
            })
            .filter(|other| seen.insert(*other))
            .filter_map(|other| self.inner.node_weight(other).map(String::as_str))
            .collect()
    }

    /// Breadth-first reachability from `seeds`, following edges in either
    /// direction, bounded by `max_nodes` and `max_depth` hops.
    ///
    /// Seeds absent from the graph are still returned at depth 0. The result
    /// is `(path, depth)` in visit order.
    pub fn reachable_within(
        &self,
        seeds: &[&str],
        max_nodes: usize,
        max_depth: u32,
    ) -> Vec<(String, u32)> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::new();

        for &seed in seeds {
            if out.len() >= max_nodes {
                return out;
            }
            if visited.insert(seed) {
                out.push((seed.to_string(), 0));
                queue.push_back((seed, 0));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(&idx) = self.index.get(current) else {
                continue;
            };
            let neighbors = self
                .inner
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| e.target())
                .chain(
                    self.inner
                        .edges_directed(idx, Direction::Incoming)
                        .map(|e| e.source()),
                );
            for other in neighbors {
                let Some(path) = self.inner.node_weight(other) else {
                    continue;
                };
                if !visited.insert(path.as_str()) {
                    continue;
                }
                if out.len() >= max_nodes {
                    return out;
                }
                out.push((path.clone(), depth + 1));
                queue.push_back((path.as_str(), depth + 1));
            }
        }

        out
    }
}

impl Default for EdgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<GraphEdge> {
        vec![
            GraphEdge::new("a", "b", EdgeKind::Import),
            GraphEdge::new("b", "c", EdgeKind::Import),
            GraphEdge::new("c", "d", EdgeKind::Import),
            GraphEdge::new("e", "a", EdgeKind::Dynamic),
        ]
    }

    #[test]
    fn test_from_edges_dedups_paths() {
        let graph = EdgeGraph::from_edges(&chain());
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.contains("d"));
        assert!(!graph.contains("z"));
    }

    #[test]
    fn test_importers_and_imports() {
        let mut edges = chain();
        edges.push(GraphEdge::new("e", "a", EdgeKind::Import));
        let graph = EdgeGraph::from_edges(&edges);

        assert_eq!(graph.importers("a"), vec!["e"]);
        assert_eq!(graph.imports("a"), vec!["b"]);
        assert!(graph.importers("missing").is_empty());
    }

    #[test]
    fn test_reachable_within_depth() {
        let graph = EdgeGraph::from_edges(&chain());
        let reached = graph.reachable_within(&["a"], 100, 2);
        let paths: HashSet<&str> = reached.iter().map(|(p, _)| p.as_str()).collect();

        assert_eq!(paths, HashSet::from(["a", "b", "c", "e"]));
        assert!(reached.contains(&("c".to_string(), 2)));
        assert!(reached.contains(&("a".to_string(), 0)));
    }

    #[test]
    fn test_reachable_within_node_cap() {
        let graph = EdgeGraph::from_edges(&chain());
        let reached = graph.reachable_within(&["a"], 3, 10);
        assert_eq!(reached.len(), 3);
        assert_eq!(reached[0], ("a".to_string(), 0));
    }

    #[test]
    fn test_reachable_within_unknown_seed() {
        let graph = EdgeGraph::from_edges(&chain());
        let reached = graph.reachable_within(&["nowhere"], 10, 3);
        assert_eq!(reached, vec![("nowhere".to_string(), 0)]);
    }
}
