//! Latest known backend state, replaced wholesale per event

use crate::assembler::{assemble, assemble_file_index};
use crate::graph::EdgeGraph;
use crate::model::{
    Diagnostics, Digest, FileIndexEntry, GraphEdge, GraphModel, GraphNode, Issue, ModuleInfo,
};

/// Holds the most recent digest, issues, edges, file index and diagnostics.
///
/// Every setter replaces the previous value; nothing is merged.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    digest: Option<Digest>,
    issues: Vec<Issue>,
    edges: Vec<GraphEdge>,
    file_index: Vec<FileIndexEntry>,
    diagnostics: Diagnostics,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_digest(&mut self, digest: Digest) {
        self.digest = Some(digest);
    }

    pub fn set_issues(&mut self, issues: Vec<Issue>) {
        self.issues = issues;
    }

    pub fn set_edges(&mut self, edges: Vec<GraphEdge>) {
        self.edges = edges;
    }

    pub fn set_file_index(&mut self, files: Vec<FileIndexEntry>) {
        self.file_index = files;
    }

    pub fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics = diagnostics;
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn file_index(&self) -> &[FileIndexEntry] {
        &self.file_index
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Issues reported against one file.
    pub fn issues_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues.iter().filter(move |i| i.file == path)
    }

    /// The connected model. `None` until a digest has arrived.
    pub fn assemble(&self) -> Option<GraphModel> {
        let digest = self.digest.as_ref()?;
        Some(assemble(digest, &self.issues, &self.edges, &self.diagnostics))
    }

    /// What the local edges and issues say about one file. `None` if the
    /// file appears in neither. Exports are only known to the backend.
    pub fn module_info(&self, path: &str) -> Option<ModuleInfo> {
        let graph = EdgeGraph::from_edges(&self.edges);
        let issues: Vec<Issue> = self.issues_for(path).cloned().collect();
        if !graph.contains(path) && issues.is_empty() {
            return None;
        }
        Some(ModuleInfo {
            path: path.to_string(),
            imports: graph.imports(path).into_iter().map(str::to_string).collect(),
            imported_by: graph.importers(path).into_iter().map(str::to_string).collect(),
            exports: Vec::new(),
            issues,
        })
    }

    /// The flat file listing.
    pub fn assemble_file_index(&self) -> Vec<GraphNode> {
        assemble_file_index(&self.file_index, &self.issues, &self.diagnostics)
    }
}
