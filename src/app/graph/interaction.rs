use eframe::egui::{self, Rect, Ui, Vec2};

use crate::layout::TreeLayout;

use super::super::render_utils::screen_to_world;
use super::super::{NodeClick, ViewModel};

const MIN_ZOOM: f32 = 0.2;
const MAX_ZOOM: f32 = 3.0;

impl ViewModel {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - rect.left_top() - (world_before.to_vec2() * self.zoom);
    }

    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
            || response.dragged_by(egui::PointerButton::Primary)
        {
            self.pan += response.drag_delta();
        }
    }

    /// Scales the whole layout into `rect`, never beyond 1:1.
    pub(in crate::app) fn fit_graph_view(&mut self, rect: Rect, layout: &TreeLayout) {
        self.pan = Vec2::ZERO;
        self.zoom = if layout.size.x > 0.0 && layout.size.y > 0.0 {
            (rect.width() / layout.size.x)
                .min(rect.height() / layout.size.y)
                .clamp(MIN_ZOOM, 1.0)
        } else {
            1.0
        };
    }

    pub(in crate::app) fn hovered_node(
        &self,
        ui: &Ui,
        rect: Rect,
        layout: &TreeLayout,
    ) -> Option<usize> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        if !rect.contains(pointer) {
            return None;
        }
        layout.node_at(screen_to_world(rect, self.pan, self.zoom, pointer))
    }
}

pub(super) fn node_click(layout: &TreeLayout, index: usize, modifier: bool) -> Option<NodeClick> {
    let node = layout.nodes.get(index)?;
    Some(NodeClick {
        name: node.name.clone(),
        domain: node.domain.clone(),
        has_templates: node.template_count > 0,
        is_template_leaf: node.is_template_leaf,
        modifier,
    })
}
