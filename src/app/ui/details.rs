use eframe::egui::{self, Align2, Color32, FontId, RichText, Sense, Ui, vec2};

use crate::taxonomy::{display_label, top_segment};
use crate::util::format_score;

use super::super::ViewModel;
use super::super::render_utils::domain_color;
use super::super::state::ExplorerEvent;

const TOP_CONTRIBUTIONS: usize = 5;
const BAR_HEIGHT: f32 = 14.0;
const BAR_LABEL_WIDTH: f32 = 110.0;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        let Some(row) = self.explorer.selected.clone() else {
            return;
        };

        ui.horizontal(|ui| {
            let heading = display_label(&row.classification);
            ui.heading(if heading.is_empty() { "Anomaly" } else { heading.as_str() });
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Close").clicked() {
                    self.dispatch(ExplorerEvent::CloseDetail);
                }
            });
        });
        ui.add_space(6.0);

        egui::Grid::new("anomaly_detail_fields")
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                ui.label(RichText::new("Timestamp").strong());
                ui.label(row.timestamp.as_str());
                ui.end_row();

                if !row.device.is_empty() {
                    ui.label(RichText::new("Device").strong());
                    ui.label(row.device.as_str());
                    ui.end_row();
                }

                ui.label(RichText::new("Classification").strong());
                ui.label(row.classification.as_str());
                ui.end_row();

                ui.label(RichText::new("Score").strong());
                ui.label(format_score(row.score));
                ui.end_row();
            });

        ui.separator();
        ui.label(RichText::new("Template").strong());
        ui.label(row.template.as_str());

        ui.separator();
        ui.label(RichText::new("Top contributions").strong());
        let top = row.top_contributions(TOP_CONTRIBUTIONS);
        if top.is_empty() {
            ui.label("No channel contributions recorded.");
            return;
        }

        let color = domain_color(top_segment(&row.classification));
        let peak = top
            .iter()
            .map(|(_, score)| score.abs())
            .fold(0.0_f64, f64::max);
        for (channel, score) in &top {
            draw_contribution_bar(ui, channel, *score, peak, color);
        }

        ui.separator();
        ui.label(RichText::new("All contributions").strong());
        egui::ScrollArea::vertical()
            .id_salt("all_contributions_scroll")
            .max_height(260.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                egui::Grid::new("all_contributions")
                    .num_columns(2)
                    .striped(true)
                    .show(ui, |ui| {
                        for (channel, score) in row.top_contributions(row.contributions.len()) {
                            ui.label(channel);
                            ui.label(RichText::new(format!("{score:.3}")).monospace());
                            ui.end_row();
                        }
                    });
            });
    }
}

fn draw_contribution_bar(ui: &mut Ui, channel: &str, score: f64, peak: f64, color: Color32) {
    let width = ui.available_width();
    let (rect, _) = ui.allocate_exact_size(vec2(width, BAR_HEIGHT + 6.0), Sense::hover());
    let painter = ui.painter_at(rect);

    painter.text(
        rect.left_center(),
        Align2::LEFT_CENTER,
        channel,
        FontId::proportional(12.0),
        ui.visuals().text_color(),
    );

    let track_width = (width - BAR_LABEL_WIDTH - 56.0).max(20.0);
    let fraction = if peak > 0.0 { (score.abs() / peak) as f32 } else { 0.0 };
    let bar = egui::Rect::from_min_size(
        rect.left_center() + vec2(BAR_LABEL_WIDTH, -BAR_HEIGHT * 0.5),
        vec2(track_width * fraction, BAR_HEIGHT),
    );
    painter.rect_filled(bar, 3.0, color);

    painter.text(
        rect.left_center() + vec2(BAR_LABEL_WIDTH + track_width + 6.0, 0.0),
        Align2::LEFT_CENTER,
        format!("{score:.3}"),
        FontId::monospace(11.0),
        ui.visuals().text_color(),
    );
}
