use eframe::egui::{Pos2, Rect, Vec2, pos2, vec2};

use crate::taxonomy::TaxonomyNode;

pub const NODE_SIZE: Vec2 = Vec2::new(160.0, 40.0);

const BREADTH_SPACING: f32 = 70.0;
const DEPTH_SPACING: f32 = 240.0;
const SIBLING_SEPARATION: f32 = 1.2;
const COUSIN_SEPARATION: f32 = 1.6;

const MARGIN_TOP: f32 = 20.0;
const MARGIN_RIGHT: f32 = 40.0;
const MARGIN_BOTTOM: f32 = 20.0;
const MARGIN_LEFT: f32 = 40.0;
const WIDTH_SLACK: f32 = 24.0;

/// A rendered node: everything below the synthetic root.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub name: String,
    pub domain: String,
    pub template_count: usize,
    pub is_template_leaf: bool,
    pub depth: usize,
    pub rect: Rect,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutEdge {
    pub from: Pos2,
    pub to: Pos2,
}

impl LayoutEdge {
    /// Cubic curve leaving and entering horizontally, bent at the midpoint.
    pub fn control_points(&self) -> [Pos2; 4] {
        let mid_x = (self.from.x + self.to.x) * 0.5;
        [
            self.from,
            pos2(mid_x, self.from.y),
            pos2(mid_x, self.to.y),
            self.to,
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeLayout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub size: Vec2,
}

impl TreeLayout {
    pub fn node_at(&self, position: Pos2) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.rect.contains(position))
    }
}

struct WalkNode {
    parent: Option<usize>,
    children: Vec<usize>,
    sibling_index: usize,
    depth: usize,
    prelim: f32,
    modifier: f32,
    change: f32,
    shift: f32,
    thread: Option<usize>,
    ancestor: usize,
    default_ancestor: Option<usize>,
    x: f32,
}

struct TidyTree<'a> {
    nodes: Vec<WalkNode>,
    sources: Vec<&'a TaxonomyNode>,
    post_order: Vec<usize>,
}

impl<'a> TidyTree<'a> {
    fn new(root: &'a TaxonomyNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            sources: Vec::new(),
            post_order: Vec::new(),
        };
        tree.insert(root, None, 0, 0);
        tree
    }

    fn insert(
        &mut self,
        source: &'a TaxonomyNode,
        parent: Option<usize>,
        sibling_index: usize,
        depth: usize,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(WalkNode {
            parent,
            children: Vec::with_capacity(source.children.len()),
            sibling_index,
            depth,
            prelim: 0.0,
            modifier: 0.0,
            change: 0.0,
            shift: 0.0,
            thread: None,
            ancestor: index,
            default_ancestor: None,
            x: 0.0,
        });
        self.sources.push(source);

        for (child_index, child) in source.children.iter().enumerate() {
            let child = self.insert(child, Some(index), child_index, depth + 1);
            self.nodes[index].children.push(child);
        }

        self.post_order.push(index);
        index
    }

    fn separation(&self, a: usize, b: usize) -> f32 {
        if self.nodes[a].parent == self.nodes[b].parent {
            SIBLING_SEPARATION
        } else {
            COUSIN_SEPARATION
        }
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.nodes[v]
            .children
            .first()
            .copied()
            .or(self.nodes[v].thread)
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.nodes[v]
            .children
            .last()
            .copied()
            .or(self.nodes[v].thread)
    }

    fn left_sibling(&self, v: usize) -> Option<usize> {
        let node = &self.nodes[v];
        let parent = node.parent?;
        let index = node.sibling_index.checked_sub(1)?;
        self.nodes[parent].children.get(index).copied()
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        for position in (0..self.nodes[v].children.len()).rev() {
            let w = self.nodes[v].children[position];
            let child = &mut self.nodes[w];
            child.prelim += shift;
            child.modifier += shift;
            change += child.change;
            shift += child.shift + change;
        }
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f32) {
        let subtrees = (self.nodes[wp].sibling_index - self.nodes[wm].sibling_index) as f32;
        let change = shift / subtrees;
        self.nodes[wp].change -= change;
        self.nodes[wp].shift += shift;
        self.nodes[wm].change += change;
        self.nodes[wp].prelim += shift;
        self.nodes[wp].modifier += shift;
    }

    fn next_ancestor(&self, vim: usize, v: usize, ancestor: usize) -> usize {
        let candidate = self.nodes[vim].ancestor;
        if self.nodes[candidate].parent == self.nodes[v].parent {
            candidate
        } else {
            ancestor
        }
    }

    fn apportion(&mut self, v: usize, w: Option<usize>, mut ancestor: usize) -> usize {
        let Some(w) = w else {
            return ancestor;
        };
        let Some(parent) = self.nodes[v].parent else {
            return ancestor;
        };

        let mut vip = Some(v);
        let mut vop = v;
        let mut vim = Some(w);
        let mut vom = self.nodes[parent].children[0];
        let mut sip = self.nodes[v].modifier;
        let mut sop = self.nodes[v].modifier;
        let mut sim = self.nodes[w].modifier;
        let mut som = self.nodes[vom].modifier;

        loop {
            vim = vim.and_then(|node| self.next_right(node));
            vip = vip.and_then(|node| self.next_left(node));
            let (Some(inner_left), Some(inner_right)) = (vim, vip) else {
                break;
            };
            let (Some(outer_left), Some(outer_right)) = (self.next_left(vom), self.next_right(vop))
            else {
                break;
            };
            vom = outer_left;
            vop = outer_right;
            self.nodes[vop].ancestor = v;

            let shift = self.nodes[inner_left].prelim + sim
                - self.nodes[inner_right].prelim
                - sip
                + self.separation(inner_left, inner_right);
            if shift > 0.0 {
                let moved = self.next_ancestor(inner_left, v, ancestor);
                self.move_subtree(moved, v, shift);
                sip += shift;
                sop += shift;
            }

            sim += self.nodes[inner_left].modifier;
            sip += self.nodes[inner_right].modifier;
            som += self.nodes[vom].modifier;
            sop += self.nodes[vop].modifier;
        }

        if let Some(inner_left) = vim
            && self.next_right(vop).is_none()
        {
            self.nodes[vop].thread = Some(inner_left);
            self.nodes[vop].modifier += sim - sop;
        }

        if let Some(inner_right) = vip
            && self.next_left(vom).is_none()
        {
            self.nodes[vom].thread = Some(inner_right);
            self.nodes[vom].modifier += sip - som;
            ancestor = v;
        }

        ancestor
    }

    fn first_walk(&mut self, v: usize) {
        let w = self.left_sibling(v);

        if let (Some(&first), Some(&last)) =
            (self.nodes[v].children.first(), self.nodes[v].children.last())
        {
            self.execute_shifts(v);
            let midpoint = (self.nodes[first].prelim + self.nodes[last].prelim) * 0.5;
            if let Some(w) = w {
                self.nodes[v].prelim = self.nodes[w].prelim + self.separation(v, w);
                self.nodes[v].modifier = self.nodes[v].prelim - midpoint;
            } else {
                self.nodes[v].prelim = midpoint;
            }
        } else if let Some(w) = w {
            self.nodes[v].prelim = self.nodes[w].prelim + self.separation(v, w);
        }

        if let Some(parent) = self.nodes[v].parent {
            let fallback = self.nodes[parent]
                .default_ancestor
                .unwrap_or(self.nodes[parent].children[0]);
            let ancestor = self.apportion(v, w, fallback);
            self.nodes[parent].default_ancestor = Some(ancestor);
        }
    }

    fn second_walk(&mut self, v: usize, parent_modifier: f32) {
        self.nodes[v].x = self.nodes[v].prelim + parent_modifier;
        self.nodes[v].modifier += parent_modifier;
    }

    /// Breadth coordinate of every node in units of `BREADTH_SPACING`, root at 0.
    fn solve(&mut self) {
        for position in 0..self.post_order.len() {
            let v = self.post_order[position];
            self.first_walk(v);
        }

        let root_modifier = -self.nodes[0].prelim;
        for v in 0..self.nodes.len() {
            let parent_modifier = match self.nodes[v].parent {
                Some(parent) => self.nodes[parent].modifier,
                None => root_modifier,
            };
            self.second_walk(v, parent_modifier);
        }
    }
}

/// Left-to-right tidy tree: depth runs along x, siblings stack along y.
///
/// The synthetic root takes part in positioning but is neither returned nor
/// connected; the bounding box covers the returned nodes plus margins.
pub fn tree_layout(root: &TaxonomyNode) -> TreeLayout {
    let mut tree = TidyTree::new(root);
    tree.solve();

    let centers = tree
        .nodes
        .iter()
        .map(|node| vec2(node.depth as f32 * DEPTH_SPACING, node.x * BREADTH_SPACING))
        .collect::<Vec<_>>();

    let rendered = (1..tree.nodes.len()).collect::<Vec<_>>();
    if rendered.is_empty() {
        return TreeLayout::default();
    }

    let (mut min, mut max) = (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY));
    for &index in &rendered {
        min = min.min(centers[index]);
        max = max.max(centers[index]);
    }

    let offset = vec2(MARGIN_LEFT - min.x, MARGIN_TOP - min.y);
    let size = vec2(
        max.x - min.x + MARGIN_LEFT + MARGIN_RIGHT + NODE_SIZE.x + WIDTH_SLACK,
        max.y - min.y + MARGIN_TOP + MARGIN_BOTTOM + NODE_SIZE.y,
    );

    let rect_of = |index: usize| {
        let anchor = centers[index] + offset;
        Rect::from_min_size(pos2(anchor.x, anchor.y - NODE_SIZE.y * 0.5), NODE_SIZE)
    };

    let nodes = rendered
        .iter()
        .map(|&index| {
            let source = tree.sources[index];
            LayoutNode {
                name: source.name.clone(),
                domain: source.domain.clone(),
                template_count: source.templates.len(),
                is_template_leaf: source.is_template_leaf,
                depth: tree.nodes[index].depth,
                rect: rect_of(index),
            }
        })
        .collect();

    let edges = rendered
        .iter()
        .filter_map(|&index| {
            let parent = tree.nodes[index].parent.filter(|&parent| parent != 0)?;
            Some(LayoutEdge {
                from: rect_of(parent).right_center(),
                to: rect_of(index).left_center(),
            })
        })
        .collect();

    TreeLayout { nodes, edges, size }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::taxonomy::build_tree;

    fn center_y(layout: &TreeLayout, name: &str) -> f32 {
        layout
            .nodes
            .iter()
            .find(|node| node.name == name)
            .map(|node| node.rect.center().y)
            .unwrap_or(f32::NAN)
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "{a} != {b}");
    }

    fn assert_pos_close(a: Pos2, b: Pos2) {
        assert_close(a.x, b.x);
        assert_close(a.y, b.y);
    }

    #[test]
    fn empty_taxonomy_has_nothing_to_render() {
        let layout = tree_layout(&build_tree(&json!({})));
        assert!(layout.nodes.is_empty());
        assert!(layout.edges.is_empty());
        assert_eq!(layout.size, Vec2::ZERO);
    }

    #[test]
    fn lays_out_a_small_tree_with_margins() {
        let layout = tree_layout(&build_tree(&json!({ "A": { "B": ["t"], "C": ["u"] } })));

        assert_eq!(layout.nodes.len(), 3);
        let a = &layout.nodes[0];
        let b = &layout.nodes[1];
        let c = &layout.nodes[2];

        assert_eq!(a.depth, 1);
        assert_eq!(b.depth, 2);
        assert_pos_close(a.rect.min, pos2(40.0, 42.0));
        assert_pos_close(b.rect.min, pos2(280.0, 0.0));
        assert_pos_close(c.rect.min, pos2(280.0, 84.0));
        assert_close(a.rect.width(), NODE_SIZE.x);
        assert_close(a.rect.height(), NODE_SIZE.y);
        assert_close(layout.size.x, 504.0);
        assert_close(layout.size.y, 164.0);
        assert_eq!(b.template_count, 1);
    }

    #[test]
    fn edges_run_from_parent_right_to_child_left() {
        let layout = tree_layout(&build_tree(&json!({ "A": { "B": ["t"], "C": ["u"] } })));

        assert_eq!(layout.edges.len(), 2);
        let edge = layout.edges[0];
        let expected = [
            pos2(200.0, 62.0),
            pos2(240.0, 62.0),
            pos2(240.0, 20.0),
            pos2(280.0, 20.0),
        ];
        for (actual, expected) in edge.control_points().into_iter().zip(expected) {
            assert_pos_close(actual, expected);
        }
    }

    #[test]
    fn cousins_are_spaced_wider_than_siblings() {
        let layout = tree_layout(&build_tree(&json!({
            "A": { "a1": [], "a2": [] },
            "B": { "b1": [], "b2": [] },
        })));

        let ys = ["a1", "a2", "b1", "b2"].map(|name| center_y(&layout, name));
        assert_close(ys[1] - ys[0], 84.0);
        assert_close(ys[2] - ys[1], 112.0);
        assert_close(ys[3] - ys[2], 84.0);

        assert_close(center_y(&layout, "A"), (ys[0] + ys[1]) * 0.5);
        assert_close(center_y(&layout, "B"), (ys[2] + ys[3]) * 0.5);
    }

    #[test]
    fn unbalanced_subtrees_do_not_overlap() {
        let layout = tree_layout(&build_tree(&json!({
            "A": { "a1": { "x1": [], "x2": [], "x3": [] }, "a2": [] },
            "B": { "b1": { "y1": [], "y2": [] } },
            "C": [],
        })));

        let mut by_depth: Vec<Vec<f32>> = Vec::new();
        for node in &layout.nodes {
            if by_depth.len() <= node.depth {
                by_depth.resize(node.depth + 1, Vec::new());
            }
            by_depth[node.depth].push(node.rect.center().y);
        }

        for row in &by_depth {
            for pair in row.windows(2) {
                assert!(pair[1] - pair[0] >= 84.0 - 1e-3, "{row:?}");
            }
        }
    }

    #[test]
    fn hit_testing_finds_nodes_by_rect() {
        let layout = tree_layout(&build_tree(&json!({ "A": ["t"] })));
        let center = layout.nodes[0].rect.center();
        assert_eq!(layout.node_at(center), Some(0));
        assert_eq!(layout.node_at(pos2(-10.0, -10.0)), None);
    }
}
