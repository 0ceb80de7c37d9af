//! Model diff computation for incremental renderer updates

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{GraphEdge, GraphModel, GraphNode};

/// Change between two successive assembled models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelDiff {
    /// Monotonically increasing diff sequence number.
    pub sequence: u64,
    pub added_nodes: Vec<GraphNode>,
    pub removed_nodes: Vec<String>,
    /// Nodes whose counts or flags changed.
    pub modified_nodes: Vec<GraphNode>,
    pub added_links: Vec<GraphEdge>,
    pub removed_links: Vec<GraphEdge>,
}

impl ModelDiff {
    pub fn new(sequence: u64) -> Self {
        ModelDiff {
            sequence,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.added_links.is_empty()
            && self.removed_links.is_empty()
    }
}

/// Sequence state for incremental updates.
#[derive(Debug, Default)]
pub struct DiffEngine {
    sequence: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        DiffEngine { sequence: 0 }
    }

    /// Compute the difference between two models, advancing the sequence.
    pub fn compute_diff(&mut self, old: &GraphModel, new: &GraphModel) -> ModelDiff {
        self.sequence += 1;
        let mut diff = ModelDiff::new(self.sequence);

        let old_nodes: HashMap<&str, &GraphNode> =
            old.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let new_ids: HashSet<&str> = new.node_ids();

        for node in &new.nodes {
            match old_nodes.get(node.id.as_str()) {
                None => diff.added_nodes.push(node.clone()),
                Some(previous) if *previous != node => diff.modified_nodes.push(node.clone()),
                Some(_) => {}
            }
        }
        diff.removed_nodes = old
            .nodes
            .iter()
            .filter(|n| !new_ids.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        let old_links: HashSet<&GraphEdge> = old.links.iter().collect();
        let new_links: HashSet<&GraphEdge> = new.links.iter().collect();
        diff.added_links = new
            .links
            .iter()
            .filter(|l| !old_links.contains(l))
            .cloned()
            .collect();
        diff.removed_links = old
            .links
            .iter()
            .filter(|l| !new_links.contains(l))
            .cloned()
            .collect();

        diff
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
