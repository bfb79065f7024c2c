use eframe::egui::{self, Align, Color32, Context, Layout, RichText, TextEdit, Ui, Vec2};
use tokio::runtime::Runtime;

use crate::api::ApiClient;
use crate::taxonomy::display_label;

use super::super::state::{ExplorerEvent, ExplorerState, ViewMode};
use super::super::{ShellRequest, Tab, ViewModel};
use super::sensors::SensorPanel;

const LIST_ROW_HEIGHT: f32 = 24.0;

impl ViewModel {
    pub(in crate::app) fn new(explorer: ExplorerState, sensors: SensorPanel) -> Self {
        Self {
            explorer,
            fetch: None,
            tab: Tab::default(),
            pan: Vec2::ZERO,
            zoom: 1.0,
            layout_cache: None,
            search_match_cache: None,
            sensors,
            password_dialog: None,
            notice: None,
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        runtime: &Runtime,
        api: &ApiClient,
    ) -> ShellRequest {
        let mut request = ShellRequest::default();
        let is_loading = self.fetch.is_some();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("edgescope");
                    ui.separator();
                    ui.selectable_value(&mut self.tab, Tab::Sensors, "Visualization");
                    ui.selectable_value(&mut self.tab, Tab::Anomalies, "Anomaly");
                    ui.separator();
                    ui.label(format!("anomalies: {}", self.explorer.rows.len()));
                    let domains = self.explorer.taxonomy.as_object().map_or(0, |map| map.len());
                    ui.label(format!("domains: {domains}"));
                    ui.label(format!("api: {}", api.base_url()));

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if ui.button("Sign out").clicked() {
                            request.logout = true;
                        }
                        if ui.button("Change password").clicked() {
                            request.change_password = true;
                        }
                        let reload =
                            ui.add_enabled(!is_loading, egui::Button::new("Reload anomalies"));
                        if reload.clicked() {
                            request.reload = true;
                        }
                        if is_loading {
                            ui.spinner();
                        }
                    });
                });

                if let Some(notice) = self.notice.clone() {
                    ui.horizontal(|ui| {
                        ui.colored_label(Color32::from_rgb(0xdc, 0x26, 0x26), notice);
                        if ui.small_button("Dismiss").clicked() {
                            self.notice = None;
                        }
                    });
                }
            });

        match self.tab {
            Tab::Sensors => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    self.sensors.show(ui, runtime, api);
                });
            }
            Tab::Anomalies => self.show_explorer(ctx),
        }

        request
    }

    fn show_explorer(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("explorer_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let mut view = self.explorer.view;
                    ui.selectable_value(&mut view, ViewMode::List, "List");
                    ui.selectable_value(&mut view, ViewMode::Graph, "Graph");
                    if view != self.explorer.view {
                        self.dispatch(ExplorerEvent::SetView(view));
                    }

                    ui.separator();
                    let mut query = self.explorer.query.clone();
                    let search = ui.add(
                        TextEdit::singleline(&mut query)
                            .hint_text("Filter by device, time, class or template")
                            .desired_width(320.0),
                    );
                    if search.changed() {
                        self.dispatch(ExplorerEvent::SetQuery(query));
                    }
                    if !self.explorer.query.is_empty() && ui.small_button("Clear").clicked() {
                        self.dispatch(ExplorerEvent::SetQuery(String::new()));
                    }
                });
            });

        if self.explorer.selected.is_some() {
            egui::SidePanel::right("details")
                .resizable(true)
                .default_width(380.0)
                .show(ctx, |ui| self.draw_details(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.explorer.view {
            ViewMode::List => self.draw_list(ui),
            ViewMode::Graph => self.draw_graph(ui),
        });
    }

    fn draw_list(&mut self, ui: &mut Ui) {
        let rows = self
            .explorer
            .filtered_rows()
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        ui.label(format!("{} of {} anomalies", rows.len(), self.explorer.rows.len()));
        ui.add_space(4.0);

        if rows.is_empty() {
            match &self.explorer.last_error {
                Some(error) if self.explorer.rows.is_empty() => {
                    ui.label(format!("Anomalies could not be loaded: {error}"));
                }
                _ => {
                    ui.label("No anomalies match the current filter.");
                }
            }
            return;
        }

        let mut opened = None;
        egui::ScrollArea::vertical()
            .id_salt("anomaly_rows_scroll")
            .auto_shrink([false, false])
            .show_rows(ui, LIST_ROW_HEIGHT, rows.len(), |ui, row_range| {
                egui::Grid::new(("anomaly_rows", row_range.start))
                    .striped(true)
                    .num_columns(3)
                    .min_row_height(LIST_ROW_HEIGHT)
                    .show(ui, |ui| {
                        for index in row_range {
                            let Some(row) = rows.get(index) else {
                                continue;
                            };
                            ui.label(RichText::new(row.timestamp.as_str()).monospace());
                            ui.label(display_label(&row.classification));
                            if ui
                                .link("Details")
                                .on_hover_text(row.template.as_str())
                                .clicked()
                            {
                                opened = Some(row.clone());
                            }
                            ui.end_row();
                        }
                    });
            });

        if let Some(row) = opened {
            self.dispatch(ExplorerEvent::SelectRow(row));
        }
    }
}
