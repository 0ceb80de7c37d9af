//! Selected and hovered node tracking

use std::collections::HashSet;

use serde::Serialize;

use crate::model::GraphEdge;

/// A selected node plus every node one edge away from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub selected: String,
    /// Always contains `selected`.
    pub neighborhood: HashSet<String>,
}

/// What the user is pointing at in the rendered graph.
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    selection: Option<Selection>,
    hovered: Option<String>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `node_id` and compute its one-hop neighborhood over `edges`,
    /// in either direction. Single pass over the edges.
    pub fn select(&mut self, node_id: &str, edges: &[GraphEdge]) -> &Selection {
        let mut neighborhood = HashSet::new();
        neighborhood.insert(node_id.to_string());
        for edge in edges {
            if edge.source == node_id {
                neighborhood.insert(edge.target.clone());
            } else if edge.target == node_id {
                neighborhood.insert(edge.source.clone());
            }
        }
        self.selection.insert(Selection {
            selected: node_id.to_string(),
            neighborhood,
        })
    }

    /// Record the hovered node. No neighborhood is computed.
    pub fn hover(&mut self, node_id: Option<&str>) {
        self.hovered = node_id.map(str::to_string);
    }

    /// Drop the selection and its neighborhood.
    pub fn clear(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.selected.as_str())
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Whether `node_id` sits outside the current neighborhood. Nothing is
    /// dimmed while nothing is selected.
    pub fn is_dimmed(&self, node_id: &str) -> bool {
        self.selection
            .as_ref()
            .is_some_and(|s| !s.neighborhood.contains(node_id))
    }

    /// Drop a selection whose node no longer exists after a model rebuild.
    pub fn retain_if_present(&mut self, ids: &HashSet<&str>) {
        if self
            .selection
            .as_ref()
            .is_some_and(|s| !ids.contains(s.selected.as_str()))
        {
            self.selection = None;
        }
        if self.hovered.as_deref().is_some_and(|h| !ids.contains(h)) {
            self.hovered = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdgeKind;

    fn edges() -> Vec<GraphEdge> {
        vec![
            GraphEdge::new("a", "b", EdgeKind::Import),
            GraphEdge::new("c", "a", EdgeKind::Import),
            GraphEdge::new("b", "d", EdgeKind::Import),
            GraphEdge::new("a", "a", EdgeKind::Dynamic),
        ]
    }

    #[test]
    fn test_select_neighborhood_both_directions() {
        let mut model = SelectionModel::new();
        let selection = model.select("a", &edges());

        assert_eq!(selection.selected, "a");
        let expected: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(selection.neighborhood, expected);
    }

    #[test]
    fn test_select_isolated_node_contains_itself() {
        let mut model = SelectionModel::new();
        let selection = model.select("lonely", &edges());
        assert_eq!(selection.neighborhood.len(), 1);
        assert!(selection.neighborhood.contains("lonely"));
    }

    #[test]
    fn test_hover_does_not_select() {
        let mut model = SelectionModel::new();
        model.hover(Some("b"));
        assert_eq!(model.hovered(), Some("b"));
        assert!(model.selection().is_none());
        assert!(!model.is_dimmed("z"));
    }

    #[test]
    fn test_clear_resets_selection() {
        let mut model = SelectionModel::new();
        model.select("a", &edges());
        assert!(model.is_dimmed("d"));
        assert!(!model.is_dimmed("b"));

        model.clear();
        assert!(model.selected().is_none());
        assert!(!model.is_dimmed("d"));
    }

    #[test]
    fn test_retain_if_present() {
        let mut model = SelectionModel::new();
        model.select("a", &edges());
        model.hover(Some("gone"));

        model.retain_if_present(&HashSet::from(["a", "b"]));
        assert_eq!(model.selected(), Some("a"));
        assert!(model.hovered().is_none());

        model.retain_if_present(&HashSet::from(["b"]));
        assert!(model.selected().is_none());
    }
}
