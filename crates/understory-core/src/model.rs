//! Core data structures for the digest, the backend stores, and the graph model

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize `null` as the type's default, for backends that send
/// `null` instead of an empty collection.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a node entered the assembled model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Pulled in by the neighbor expansion pass, or listed in the file index.
    File,
    /// Seeded from the digest's ranked hotspot list.
    Hotspot,
    /// Reachable from a route, page, command or job.
    Entrypoint,
}

/// A single file in the assembled graph model. `id` is the file path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub is_entrypoint: bool,
    pub is_hotspot: bool,
    pub importer_count: u32,
    pub export_count: u32,
    pub issue_count: u32,
    pub diagnostic_errors: u32,
    pub diagnostic_warnings: u32,
    /// Renderer hint for node radius.
    pub size_hint: u32,
}

/// What kind of dependency an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Import,
    Export,
    Reexport,
    Dynamic,
}

/// A directed dependency between two files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        GraphEdge {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    /// Whether `node` is either endpoint of this edge.
    pub fn touches(&self, node: &str) -> bool {
        self.source == node || self.target == node
    }
}

/// The bounded `{nodes, links}` model handed to a renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphModel {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphEdge>,
}

impl GraphModel {
    /// An empty model is a legitimate terminal state, not an error.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Largest importer count in the model, 0 when empty.
    pub fn max_importers(&self) -> u32 {
        self.nodes.iter().map(|n| n.importer_count).max().unwrap_or(0)
    }
}

/// A file with many importers, as ranked by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Hotspot {
    pub path: String,
    pub importers: u32,
    pub exports: u32,
}

/// Entrypoint paths grouped by the trigger that reaches them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EntrypointsByCategory {
    #[serde(deserialize_with = "null_as_default")]
    pub routes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub pages: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub commands: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub jobs: Vec<String>,
}

impl EntrypointsByCategory {
    /// Every entrypoint path across all categories, in category order.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.routes
            .iter()
            .chain(&self.pages)
            .chain(&self.commands)
            .chain(&self.jobs)
            .map(String::as_str)
    }
}

/// Periodic summary of codebase structure.
///
/// Every field defaults, so a digest with missing or `null` collections
/// still deserializes and assembles as if those collections were empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Digest {
    #[serde(deserialize_with = "null_as_default")]
    pub file_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub module_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub entrypoint_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub edge_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub hotspots: Vec<Hotspot>,
    #[serde(deserialize_with = "null_as_default")]
    pub entrypoints_by_category: EntrypointsByCategory,
    #[serde(deserialize_with = "null_as_default")]
    pub issue_counts_by_kind: BTreeMap<String, u32>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub token_estimate: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// A problem the backend detected in one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    /// Free-form category such as `cycle` or `dead-export`. Empty if unknown.
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: Severity,
    pub file: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggested_fix: Vec<String>,
}

/// Editor diagnostic tallies for one file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DiagnosticCounts {
    pub errors: u32,
    pub warnings: u32,
}

/// Per-file diagnostics keyed by path.
pub type Diagnostics = HashMap<String, DiagnosticCounts>;

/// One row of the backend's flat file index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FileIndexEntry {
    pub path: String,
    pub importers: u32,
    pub exports: u32,
    pub is_entrypoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AffectedFile {
    pub path: String,
    #[serde(default)]
    pub is_entrypoint: bool,
    /// Hops from the impact target.
    pub distance: u32,
}

/// Files transitively affected by a change to `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpactResult {
    pub target: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub affected_files: Vec<AffectedFile>,
}

impl ImpactResult {
    /// Affected files ordered nearest first, ties by path.
    pub fn by_distance(&self) -> Vec<&AffectedFile> {
        let mut files: Vec<&AffectedFile> = self.affected_files.iter().collect();
        files.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.path.cmp(&b.path)));
        files
    }

    pub fn affected_entrypoints(&self) -> impl Iterator<Item = &AffectedFile> {
        self.affected_files.iter().filter(|f| f.is_entrypoint)
    }
}

/// Module detail for a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleInfo {
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub imports: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub imported_by: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub exports: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
}

/// What a context item was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Issue,
    Hotspot,
    Digest,
}

impl ContextKind {
    /// Dedup key for a payload of this kind: the issue id, the hotspot path,
    /// or the literal `"digest"`. `None` when the payload lacks the field.
    pub fn derive_key(self, payload: &serde_json::Value) -> Option<String> {
        match self {
            ContextKind::Issue => payload.get("id")?.as_str().map(str::to_string),
            ContextKind::Hotspot => payload.get("path")?.as_str().map(str::to_string),
            ContextKind::Digest => Some("digest".to_string()),
        }
    }
}

/// Something queued for the next request to the external analysis assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextItem {
    pub kind: ContextKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub added_at: DateTime<Utc>,
}

impl ContextItem {
    pub fn new(kind: ContextKind, payload: serde_json::Value) -> Self {
        ContextItem {
            kind,
            payload,
            added_at: Utc::now(),
        }
    }

    pub fn key(&self) -> Option<String> {
        self.kind.derive_key(&self.payload)
    }
}
