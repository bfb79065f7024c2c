use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::epaint::CubicBezierShape;
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::layout::TreeLayout;
use crate::util::truncate_label;

use super::super::render_utils::{
    EDGE_COLOR, NODE_OUTLINE, NODE_TEXT, TEMPLATE_FILL, TEMPLATE_TEXT, blend_color, domain_color,
    draw_background, world_to_screen,
};
use super::super::{ExplorerEvent, SearchMatchCache, ViewModel};
use super::interaction::node_click;

const NODE_ROUNDING: f32 = 8.0;
const LABEL_MIN_ZOOM: f32 = 0.35;
const SEARCH_HIGHLIGHT: Color32 = Color32::from_rgb(0xfa, 0xcc, 0x15);

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    fn cached_search_matches(&mut self, layout: &TreeLayout) -> Option<Arc<HashSet<usize>>> {
        let query = self.explorer.query.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(cached) = &self.search_match_cache
            && cached.tree_revision == self.explorer.tree_revision
            && cached.query == query
        {
            return Some(Arc::clone(&cached.matches));
        }

        let matcher = SkimMatcherV2::default();
        let matches = layout
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                fuzzy_match_score(&matcher, &node.name, query).map(|_| index)
            })
            .collect::<HashSet<_>>();
        let matches = Arc::new(matches);

        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            tree_revision: self.explorer.tree_revision,
            matches: Arc::clone(&matches),
        });

        Some(matches)
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        self.ensure_layout();
        let Some(cache) = self.layout_cache.take() else {
            return;
        };

        let fit_requested = ui
            .horizontal(|ui| {
                let clicked = ui.button("Fit").clicked();
                ui.label("Click a group to expand its templates, a template to open its anomaly.");
                ui.label("Shift-click filters the list by that node.");
                clicked
            })
            .inner;

        self.paint_layout(ui, &cache.layout, fit_requested);
        self.layout_cache = Some(cache);
    }

    fn paint_layout(&mut self, ui: &mut Ui, layout: &TreeLayout, fit_requested: bool) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        if fit_requested {
            self.fit_graph_view(rect, layout);
        }

        draw_background(&painter, rect, self.pan, self.zoom);

        if layout.nodes.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No taxonomy loaded yet.",
                FontId::proportional(14.0),
                Color32::from_gray(110),
            );
            return;
        }

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);
        if response.dragged() {
            ui.ctx().request_repaint();
        }

        let pan = self.pan;
        let zoom = self.zoom;
        let to_screen = |point: Pos2| world_to_screen(rect, pan, zoom, point);

        let edge_stroke = Stroke::new((1.5 * zoom).clamp(0.75, 3.0), EDGE_COLOR);
        for edge in &layout.edges {
            let points = edge.control_points().map(to_screen);
            let bounds = Rect::from_points(&points);
            if !bounds.intersects(rect) {
                continue;
            }
            painter.add(CubicBezierShape::from_points_stroke(
                points,
                false,
                Color32::TRANSPARENT,
                edge_stroke,
            ));
        }

        let hovered = self.hovered_node(ui, rect, layout);
        if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        let search_matches = self.cached_search_matches(layout);
        let label_font = FontId::proportional(12.0 * zoom);
        let badge_font = FontId::proportional(10.0 * zoom);

        for (index, node) in layout.nodes.iter().enumerate() {
            let screen_rect =
                Rect::from_min_max(to_screen(node.rect.min), to_screen(node.rect.max));
            if !screen_rect.intersects(rect) {
                continue;
            }

            let (base_fill, text_color) = if node.is_template_leaf {
                (TEMPLATE_FILL, TEMPLATE_TEXT)
            } else {
                (domain_color(&node.domain), NODE_TEXT)
            };
            let fill = if hovered == Some(index) {
                blend_color(base_fill, Color32::WHITE, 0.18)
            } else {
                base_fill
            };
            let is_match = search_matches
                .as_ref()
                .is_some_and(|matches| matches.contains(&index));
            let outline = if is_match {
                Stroke::new(2.5, SEARCH_HIGHLIGHT)
            } else if node.depth == 1 {
                Stroke::new(1.5, Color32::from_gray(40))
            } else {
                Stroke::new(1.0, NODE_OUTLINE)
            };

            painter.rect(
                screen_rect,
                NODE_ROUNDING * zoom,
                fill,
                outline,
                egui::StrokeKind::Inside,
            );

            if zoom >= LABEL_MIN_ZOOM {
                painter.text(
                    screen_rect.center(),
                    Align2::CENTER_CENTER,
                    truncate_label(&node.name),
                    label_font.clone(),
                    text_color,
                );

                if node.template_count > 0 && !node.is_template_leaf {
                    painter.text(
                        screen_rect.left_top()
                            + vec2(screen_rect.width() - 6.0 * zoom, 11.0 * zoom),
                        Align2::RIGHT_CENTER,
                        node.template_count.to_string(),
                        badge_font.clone(),
                        text_color,
                    );
                }
            }
        }

        if let Some(index) = hovered
            && let Some(node) = layout.nodes.get(index)
        {
            let hint = if node.is_template_leaf {
                "click to open the matching anomaly"
            } else if node.template_count > 0 {
                "click to toggle templates"
            } else {
                "shift-click to filter"
            };
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{}  |  {}  |  {hint}", node.name, node.domain),
                FontId::proportional(13.0),
                Color32::from_gray(40),
            );
        }

        if response.clicked_by(egui::PointerButton::Primary)
            && let Some(index) = hovered
        {
            let modifier = ui.input(|input| input.modifiers.shift);
            if let Some(click) = node_click(layout, index, modifier) {
                self.dispatch(ExplorerEvent::NodeClicked(click));
            }
        }
    }
}
