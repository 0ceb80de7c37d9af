//! Understory core: graph data model, bounded assembly, selection and diffing

pub mod assembler;
pub mod diff;
pub mod graph;
pub mod model;
pub mod selection;
pub mod stores;


pub use assembler::{assemble, assemble_file_index, relative_weight, MAX_EXPANDED_NODES};
pub use diff::{DiffEngine, ModelDiff};
pub use graph::EdgeGraph;
pub use model::{
    AffectedFile, ContextItem, ContextKind, DiagnosticCounts, Diagnostics, Digest, EdgeKind,
    EntrypointsByCategory, FileIndexEntry, GraphEdge, GraphModel, GraphNode, Hotspot,
    ImpactResult, Issue, ModuleInfo, NodeKind, RiskLevel, Severity,
};
pub use selection::{Selection, SelectionModel};
pub use stores::Stores;
