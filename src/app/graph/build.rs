use crate::layout::tree_layout;

use super::super::{LayoutCache, ViewModel};

impl ViewModel {
    /// Recomputes the layout when the expanded tree changed since the last
    /// frame.
    pub(in crate::app) fn ensure_layout(&mut self) {
        let revision = self.explorer.tree_revision;
        if self
            .layout_cache
            .as_ref()
            .is_some_and(|cache| cache.tree_revision == revision)
        {
            return;
        }

        let tree = self.explorer.expanded_tree();
        let layout = tree_layout(&tree);
        tracing::debug!(
            revision,
            tree_nodes = tree.node_count(),
            nodes = layout.nodes.len(),
            edges = layout.edges.len(),
            "rebuilt taxonomy layout"
        );

        self.layout_cache = Some(LayoutCache {
            tree_revision: revision,
            layout,
        });
        self.search_match_cache = None;
    }
}
