//! Bounded graph assembly from the digest, issues, edges and diagnostics
//!
//! The model favors hotspots, entrypoints and their direct neighbors over the
//! full transitive closure. For exact reachability from the seeds use
//! [`EdgeGraph::reachable_within`](crate::graph::EdgeGraph::reachable_within).

use std::collections::{HashMap, HashSet};

use crate::model::{
    Diagnostics, Digest, FileIndexEntry, GraphEdge, GraphModel, GraphNode, Issue, NodeKind,
};

/// Hard cap on nodes added by the neighbor expansion pass.
pub const MAX_EXPANDED_NODES: usize = 50;

const MIN_SIZE_HINT: u32 = 5;
const MAX_SIZE_HINT: u32 = 20;
const ENTRYPOINT_SIZE_HINT: u32 = 8;
const EXPANDED_SIZE_HINT: u32 = 5;

/// Build the bounded `{nodes, links}` model.
///
/// Deterministic for identical inputs. An empty hotspot and entrypoint list
/// yields an empty model; callers render that as its own state.
pub fn assemble(
    digest: &Digest,
    issues: &[Issue],
    edges: &[GraphEdge],
    diagnostics: &Diagnostics,
) -> GraphModel {
    let entrypoints: HashSet<&str> = digest.entrypoints_by_category.all().collect();
    let issue_counts = count_issues(issues);
    // Real counts from edges win over the digest's approximation.
    let edge_importers = if edges.is_empty() {
        None
    } else {
        Some(count_importers(edges))
    };
    let importers_of = |path: &str| edge_importers.as_ref().and_then(|m| m.get(path).copied());

    let mut nodes = NodeSet::new(&issue_counts, diagnostics);

    for hotspot in &digest.hotspots {
        if nodes.contains(&hotspot.path) {
            continue;
        }
        let is_entrypoint = entrypoints.contains(hotspot.path.as_str());
        let importers = importers_of(&hotspot.path).unwrap_or(hotspot.importers);
        nodes.push(GraphNode {
            id: hotspot.path.clone(),
            name: file_name(&hotspot.path),
            kind: if is_entrypoint {
                NodeKind::Entrypoint
            } else {
                NodeKind::Hotspot
            },
            is_entrypoint,
            is_hotspot: true,
            importer_count: importers,
            export_count: hotspot.exports,
            issue_count: 0,
            diagnostic_errors: 0,
            diagnostic_warnings: 0,
            size_hint: importers.clamp(MIN_SIZE_HINT, MAX_SIZE_HINT),
        });
    }

    for path in digest.entrypoints_by_category.all() {
        if nodes.contains(path) {
            continue;
        }
        nodes.push(GraphNode {
            id: path.to_string(),
            name: file_name(path),
            kind: NodeKind::Entrypoint,
            is_entrypoint: true,
            is_hotspot: false,
            importer_count: importers_of(path).unwrap_or(0),
            export_count: 0,
            issue_count: 0,
            diagnostic_errors: 0,
            diagnostic_warnings: 0,
            size_hint: ENTRYPOINT_SIZE_HINT,
        });
    }

    let mut links = Vec::new();
    let mut seen_links: HashSet<(&str, &str)> = HashSet::new();
    link_pass(&nodes, edges, &mut seen_links, &mut links);

    for path in expansion_candidates(&nodes, edges)
        .into_iter()
        .take(MAX_EXPANDED_NODES)
    {
        nodes.push(GraphNode {
            id: path.to_string(),
            name: file_name(path),
            kind: NodeKind::File,
            is_entrypoint: false,
            is_hotspot: false,
            importer_count: importers_of(path).unwrap_or(0),
            export_count: 0,
            issue_count: 0,
            diagnostic_errors: 0,
            diagnostic_warnings: 0,
            size_hint: EXPANDED_SIZE_HINT,
        });
    }

    link_pass(&nodes, edges, &mut seen_links, &mut links);

    tracing::debug!(
        nodes = nodes.len(),
        links = links.len(),
        "Assembled graph model"
    );

    GraphModel {
        nodes: nodes.into_nodes(),
        links,
    }
}

/// One node per indexed file, with issue and diagnostic attachment but no
/// links and no expansion. Duplicate paths keep their first entry.
pub fn assemble_file_index(
    file_index: &[FileIndexEntry],
    issues: &[Issue],
    diagnostics: &Diagnostics,
) -> Vec<GraphNode> {
    let issue_counts = count_issues(issues);
    let mut nodes = NodeSet::new(&issue_counts, diagnostics);

    for entry in file_index {
        if nodes.contains(&entry.path) {
            continue;
        }
        nodes.push(GraphNode {
            id: entry.path.clone(),
            name: file_name(&entry.path),
            kind: if entry.is_entrypoint {
                NodeKind::Entrypoint
            } else {
                NodeKind::File
            },
            is_entrypoint: entry.is_entrypoint,
            is_hotspot: false,
            importer_count: entry.importers,
            export_count: entry.exports,
            issue_count: 0,
            diagnostic_errors: 0,
            diagnostic_warnings: 0,
            size_hint: entry.importers.clamp(MIN_SIZE_HINT, MAX_SIZE_HINT),
        });
    }

    nodes.into_nodes()
}

/// `value / max` for bar widths, 0.0 when `max` is zero.
pub fn relative_weight(value: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    f64::from(value) / f64::from(max)
}

/// Final path segment, used as the display name.
pub fn file_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}

fn count_issues(issues: &[Issue]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for issue in issues {
        *counts.entry(issue.file.as_str()).or_insert(0) += 1;
    }
    counts
}

fn count_importers(edges: &[GraphEdge]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for edge in edges {
        *counts.entry(edge.target.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Endpoints missing from the node set on edges with exactly one endpoint
/// present, deduplicated, in edge order.
fn expansion_candidates<'e>(nodes: &NodeSet<'_>, edges: &'e [GraphEdge]) -> Vec<&'e str> {
    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for edge in edges {
        let has_source = nodes.contains(&edge.source);
        let has_target = nodes.contains(&edge.target);
        let candidate = match (has_source, has_target) {
            (true, false) => edge.target.as_str(),
            (false, true) => edge.source.as_str(),
            _ => continue,
        };
        if seen.insert(candidate) {
            missing.push(candidate);
        }
    }
    missing
}

/// Append every edge with both endpoints present that has not been linked
/// yet. Dedup is on the ordered pair, so `a→b` and `b→a` both survive.
fn link_pass<'e>(
    nodes: &NodeSet<'_>,
    edges: &'e [GraphEdge],
    seen: &mut HashSet<(&'e str, &'e str)>,
    links: &mut Vec<GraphEdge>,
) {
    for edge in edges {
        if !nodes.contains(&edge.source) || !nodes.contains(&edge.target) {
            continue;
        }
        if seen.insert((edge.source.as_str(), edge.target.as_str())) {
            links.push(edge.clone());
        }
    }
}

/// Insertion-ordered node list with an id index. Issue and diagnostic
/// counts are attached on push so every node kind gets them the same way.
struct NodeSet<'a> {
    nodes: Vec<GraphNode>,
    ids: HashSet<String>,
    issue_counts: &'a HashMap<&'a str, u32>,
    diagnostics: &'a Diagnostics,
}

impl<'a> NodeSet<'a> {
    fn new(issue_counts: &'a HashMap<&'a str, u32>, diagnostics: &'a Diagnostics) -> Self {
        NodeSet {
            nodes: Vec::new(),
            ids: HashSet::new(),
            issue_counts,
            diagnostics,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, mut node: GraphNode) {
        node.issue_count = self.issue_counts.get(node.id.as_str()).copied().unwrap_or(0);
        if let Some(diag) = self.diagnostics.get(&node.id) {
            node.diagnostic_errors = diag.errors;
            node.diagnostic_warnings = diag.warnings;
        }
        self.ids.insert(node.id.clone());
        self.nodes.push(node);
    }

    fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }
}
