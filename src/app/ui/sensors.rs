use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use chrono::DateTime;
use eframe::egui::{
    self, Align2, Color32, Context, FontId, Pos2, Rect, RichText, Sense, Shape, Stroke, TextEdit,
    Ui, pos2, vec2,
};
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, ApiResult, SensorPayload, TimeRange};
use crate::config::AppConfig;
use crate::sensors::{
    ChartUnits, SeriesPoint, chart_units, exceeds_long_range, format_time_string,
    parse_timestamp, process_series, write_csv,
};

use super::super::render_utils::domain_color;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const AXIS_MARGIN: f32 = 64.0;
const X_TICKS: usize = 5;
const Y_TICKS: usize = 5;
const MARKER_RADIUS: f32 = 4.0;
const MARKER_HIT_RADIUS: f32 = 7.0;
const ANOMALY_MARKER: Color32 = Color32::from_rgb(0xdc, 0x26, 0x26);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Severity {
    Warning,
    Error,
}

/// Background request whose answer arrives through a channel polled each frame.
struct Pending<T> {
    rx: Receiver<T>,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> Pending<T> {
    fn spawn<F>(runtime: &Runtime, work: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = runtime.spawn(async move {
            let _ = tx.send(work.await);
        });
        Self { rx, handle }
    }
}

struct DataReply {
    window: (String, String),
    result: ApiResult<SensorPayload>,
}

/// Series prepared for one plot.
#[derive(Clone, Debug, Default)]
struct ChartData {
    series: BTreeMap<String, Vec<SeriesPoint>>,
    anomalies: BTreeMap<String, Vec<SeriesPoint>>,
    units: ChartUnits,
    x_range: Option<(f64, f64)>,
    y_ranges: Vec<(f64, f64)>,
}

impl ChartData {
    fn build(
        payload: &SensorPayload,
        channels: &[String],
        aliases: &BTreeMap<String, String>,
        max_points: usize,
    ) -> Self {
        let series = process_series(&payload.data, channels, aliases, Some(max_points));
        let anomalies = process_series(&payload.anomaly_data, channels, aliases, None);
        let units = chart_units(channels, aliases);

        let all_points = || series.values().chain(anomalies.values()).flatten();
        let x_range = value_range(all_points().map(|point| point.x));

        let y_ranges = (0..units.units.len().max(1))
            .map(|axis| {
                let on_axis = all_series_on_axis(&series, &anomalies, &units, axis);
                value_range(on_axis.map(|point| point.y)).unwrap_or((0.0, 1.0))
            })
            .collect();

        Self {
            series,
            anomalies,
            units,
            x_range,
            y_ranges,
        }
    }

    fn axis_of(&self, alias: &str) -> usize {
        self.units.axis_map.get(alias).copied().unwrap_or(0)
    }
}

fn all_series_on_axis<'a>(
    series: &'a BTreeMap<String, Vec<SeriesPoint>>,
    anomalies: &'a BTreeMap<String, Vec<SeriesPoint>>,
    units: &'a ChartUnits,
    axis: usize,
) -> impl Iterator<Item = &'a SeriesPoint> {
    series
        .iter()
        .chain(anomalies.iter())
        .filter(move |(alias, _)| units.axis_map.get(*alias).copied().unwrap_or(0) == axis)
        .flat_map(|(_, points)| points.iter())
}

/// Smallest and largest value, widened when they coincide so the axis keeps a
/// non-zero span.
fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|value| value.is_finite())
        .fold(None, |range: Option<(f64, f64)>, value| match range {
            Some((min, max)) => Some((min.min(value), max.max(value))),
            None => Some((value, value)),
        })?;

    if (max - min).abs() < f64::EPSILON {
        let pad = if min.abs() > 1.0 { min.abs() * 0.05 } else { 1.0 };
        Some((min - pad, max + pad))
    } else {
        Some((min, max))
    }
}

fn data_error_message(error: &ApiError) -> String {
    match error {
        ApiError::Timeout | ApiError::Connection(_) => {
            "Data loading timed out. Please try selecting a smaller time range.".to_owned()
        }
        ApiError::Status { status: 401, .. } => "Failed to load data".to_owned(),
        ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
        _ => "Failed to load data. Please try again later.".to_owned(),
    }
}

/// Fields of a raw anomaly row worth showing, with channel aliases applied.
fn anomaly_fields(row: &Value, aliases: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let Some(object) = row.as_object() else {
        return Vec::new();
    };

    object
        .iter()
        .filter(|(key, _)| {
            key.as_str() != "ts"
                && key.as_str() != "deviceid"
                && key.as_str() != "label"
                && !key.starts_with('c')
        })
        .map(|(key, value)| {
            let name = aliases.get(key).cloned().unwrap_or_else(|| key.clone());
            let text = match value {
                Value::Number(number) => number
                    .as_f64()
                    .map_or_else(|| number.to_string(), |value| format!("{value:.3}")),
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (name, text)
        })
        .collect()
}

fn format_tick_time(seconds: f64) -> String {
    DateTime::from_timestamp(seconds.round() as i64, 0)
        .map(|stamp| stamp.format("%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Sensor dashboard: time window, channel selection, line chart and export.
pub struct SensorPanel {
    config: AppConfig,
    selected: Vec<String>,
    plotted: Vec<String>,
    start_time: String,
    end_time: String,
    loaded_window: Option<(String, String)>,
    raw: SensorPayload,
    chart: Option<ChartData>,
    inspected: Option<usize>,
    time_range_request: Option<Pending<ApiResult<TimeRange>>>,
    data_request: Option<Pending<DataReply>>,
    notice: Option<(Severity, String)>,
}

impl SensorPanel {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            selected: Vec::new(),
            plotted: Vec::new(),
            start_time: String::new(),
            end_time: String::new(),
            loaded_window: None,
            raw: SensorPayload::default(),
            chart: None,
            inspected: None,
            time_range_request: None,
            data_request: None,
            notice: None,
        }
    }

    pub fn request_time_range(&mut self, runtime: &Runtime, api: &ApiClient) {
        let api = api.clone();
        self.time_range_request = Some(Pending::spawn(runtime, async move {
            api.time_range().await
        }));
    }

    pub fn poll(&mut self, ctx: &Context) {
        if let Some(pending) = &self.time_range_request {
            match pending.rx.try_recv() {
                Ok(result) => {
                    self.time_range_request = None;
                    self.apply_time_range(result);
                }
                Err(TryRecvError::Empty) => ctx.request_repaint_after(POLL_INTERVAL),
                Err(TryRecvError::Disconnected) => self.time_range_request = None,
            }
        }

        if let Some(pending) = &self.data_request {
            match pending.rx.try_recv() {
                Ok(reply) => {
                    self.data_request = None;
                    self.apply_data(reply);
                }
                Err(TryRecvError::Empty) => ctx.request_repaint_after(POLL_INTERVAL),
                Err(TryRecvError::Disconnected) => self.data_request = None,
            }
        }
    }

    /// Aborts whatever is still in flight.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.time_range_request.take() {
            pending.handle.abort();
        }
        if let Some(pending) = self.data_request.take() {
            pending.handle.abort();
        }
    }

    fn apply_time_range(&mut self, result: ApiResult<TimeRange>) {
        match result {
            Ok(range) => {
                info!(
                    start = %range.start_time,
                    end = %range.end_time,
                    "sensor time range received"
                );
                self.start_time = format_time_string(&range.start_time);
                self.end_time = format_time_string(&range.end_time);
            }
            Err(error) => {
                warn!("failed to fetch time range: {error}");
                self.notice = Some((Severity::Error, "Failed to fetch time range.".to_owned()));
            }
        }
    }

    fn apply_data(&mut self, reply: DataReply) {
        match reply.result {
            Ok(payload) => {
                info!(
                    rows = payload.data.len(),
                    anomalies = payload.anomaly_data.len(),
                    "sensor data received"
                );
                self.raw = payload;
                self.loaded_window = Some(reply.window);
                self.inspected = None;
                self.rebuild_chart();
            }
            Err(error) => {
                warn!("failed to load sensor data: {error}");
                self.notice = Some((Severity::Error, data_error_message(&error)));
            }
        }
    }

    fn rebuild_chart(&mut self) {
        self.chart = Some(ChartData::build(
            &self.raw,
            &self.plotted,
            &self.config.channel_aliases,
            self.config.max_points,
        ));
    }

    fn plot_requested(&mut self, runtime: &Runtime, api: &ApiClient) {
        if self.selected.is_empty() {
            self.notice = Some((
                Severity::Warning,
                "Please select at least one channel".to_owned(),
            ));
            return;
        }

        self.notice = exceeds_long_range(&self.start_time, &self.end_time).then(|| {
            (
                Severity::Warning,
                "Loading data for more than 14 days may take longer or time out. \
                 If a timeout occurs, please try a shorter time range."
                    .to_owned(),
            )
        });
        self.plotted = self.selected.clone();

        let window = (self.start_time.clone(), self.end_time.clone());
        if self.loaded_window.as_ref() == Some(&window) {
            self.rebuild_chart();
            return;
        }

        let api = api.clone();
        let start = format_time_string(&window.0);
        let end = format_time_string(&window.1);
        self.data_request = Some(Pending::spawn(runtime, async move {
            let result = api.data(&start, &end).await;
            DataReply { window, result }
        }));
    }

    fn export_requested(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_file_name("sensor_data.csv")
            .add_filter("CSV", &["csv"])
            .save_file()
        else {
            return;
        };

        if let Err(error) = write_csv(&path, &self.raw.data, &self.config.channel_aliases) {
            warn!("csv export failed: {error:#}");
            self.notice = Some((Severity::Error, format!("Export failed: {error}")));
        }
    }

    pub fn show(&mut self, ui: &mut Ui, runtime: &Runtime, api: &ApiClient) {
        let is_loading = self.data_request.is_some();

        ui.horizontal(|ui| {
            ui.label("Start time");
            ui.add(TextEdit::singleline(&mut self.start_time).desired_width(170.0));
            ui.label("End time");
            ui.add(TextEdit::singleline(&mut self.end_time).desired_width(170.0));
            if self.time_range_request.is_some() {
                ui.spinner();
            }

            ui.separator();
            self.channel_menu(ui);

            if ui
                .add_enabled(!is_loading, egui::Button::new("Plot"))
                .clicked()
            {
                self.plot_requested(runtime, api);
            }
            if ui
                .add_enabled(!self.raw.data.is_empty(), egui::Button::new("Export CSV"))
                .clicked()
            {
                self.export_requested();
            }
        });

        if let Some((severity, text)) = self.notice.clone() {
            let color = match severity {
                Severity::Warning => Color32::from_rgb(0xd9, 0x77, 0x06),
                Severity::Error => Color32::from_rgb(0xdc, 0x26, 0x26),
            };
            ui.horizontal(|ui| {
                ui.colored_label(color, text);
                if ui.small_button("Dismiss").clicked() {
                    self.notice = None;
                }
            });
        }
        ui.separator();

        if is_loading {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.spinner();
            });
            return;
        }

        self.draw_chart(ui);
        self.anomaly_window(ui.ctx());
    }

    fn channel_menu(&mut self, ui: &mut Ui) {
        let summary = if self.selected.is_empty() {
            "Select channels".to_owned()
        } else {
            self.selected
                .iter()
                .map(|channel| self.config.alias(channel))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut toggled = None;
        ui.menu_button(summary, |ui| {
            egui::ScrollArea::vertical()
                .max_height(300.0)
                .show(ui, |ui| {
                    for channel in &self.config.channels {
                        let mut checked = self.selected.contains(channel);
                        if ui.checkbox(&mut checked, self.config.alias(channel)).changed() {
                            toggled = Some(channel.clone());
                        }
                    }
                });
        });

        if let Some(channel) = toggled {
            self.toggle_channel(&channel);
        }
    }

    /// Flips one channel in the selection, which stays in configured channel
    /// order.
    fn toggle_channel(&mut self, channel: &str) {
        let mut selected = std::mem::take(&mut self.selected);
        if let Some(position) = selected.iter().position(|name| name == channel) {
            selected.remove(position);
        } else {
            selected.push(channel.to_owned());
        }
        self.selected = self
            .config
            .channels
            .iter()
            .filter(|name| selected.contains(name))
            .cloned()
            .collect();
    }

    fn draw_chart(&mut self, ui: &mut Ui) {
        let Some(chart) = &self.chart else {
            ui.label("Pick a time window and channels, then press Plot.");
            return;
        };

        ui.horizontal_wrapped(|ui| {
            for alias in chart.series.keys() {
                ui.label(RichText::new("━━").color(domain_color(alias)));
                ui.label(alias.as_str());
            }
            if chart.anomalies.values().any(|points| !points.is_empty()) {
                ui.label(RichText::new("●").color(ANOMALY_MARKER));
                ui.label("anomaly");
            }
        });

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 4.0, Color32::WHITE);

        let Some((x_min, x_max)) = chart.x_range else {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No data in the selected window.",
                FontId::proportional(14.0),
                Color32::from_gray(110),
            );
            return;
        };

        let plot = Rect::from_min_max(
            rect.min + vec2(AXIS_MARGIN, 16.0),
            rect.max - vec2(AXIS_MARGIN, 40.0),
        );
        let to_screen = |x: f64, y: f64, axis: usize| -> Pos2 {
            let (y_min, y_max) = chart.y_ranges.get(axis).copied().unwrap_or((0.0, 1.0));
            let fx = if x_max > x_min { (x - x_min) / (x_max - x_min) } else { 0.5 };
            let fy = (y - y_min) / (y_max - y_min);
            pos2(
                plot.left() + fx as f32 * plot.width(),
                plot.bottom() - fy as f32 * plot.height(),
            )
        };

        draw_axes(&painter, plot, chart, (x_min, x_max));

        for (alias, points) in &chart.series {
            if points.len() < 2 {
                continue;
            }
            let axis = chart.axis_of(alias);
            let line = points
                .iter()
                .map(|point| to_screen(point.x, point.y, axis))
                .collect::<Vec<_>>();
            painter.add(Shape::line(line, Stroke::new(1.5, domain_color(alias))));
        }

        let pointer = ui.input(|input| input.pointer.hover_pos());
        let mut hovered = None;
        for (alias, points) in &chart.anomalies {
            let axis = chart.axis_of(alias);
            for point in points {
                let center = to_screen(point.x, point.y, axis);
                if !plot.expand(MARKER_RADIUS).contains(center) {
                    continue;
                }
                painter.circle(
                    center,
                    MARKER_RADIUS,
                    ANOMALY_MARKER,
                    Stroke::new(1.0, Color32::WHITE),
                );
                if pointer.is_some_and(|pointer| pointer.distance(center) <= MARKER_HIT_RADIUS) {
                    hovered = Some(point.x);
                }
            }
        }

        if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }
        if response.clicked()
            && let Some(x) = hovered
        {
            self.inspected = self.raw.anomaly_data.iter().position(|row| {
                row.get("ts")
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp)
                    .is_some_and(|ts| {
                        (ts.and_utc().timestamp_millis() as f64 / 1000.0 - x).abs() < 1e-3
                    })
            });
        }
    }

    fn anomaly_window(&mut self, ctx: &Context) {
        let Some(index) = self.inspected else {
            return;
        };
        let Some(row) = self.raw.anomaly_data.get(index) else {
            self.inspected = None;
            return;
        };

        let mut open = true;
        egui::Window::new("Anomaly Details")
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                let timestamp = row.get("ts").and_then(Value::as_str).unwrap_or("N/A");
                ui.label(RichText::new(format!("Timestamp: {timestamp}")).strong());
                ui.separator();
                egui::Grid::new("sensor_anomaly_fields")
                    .num_columns(2)
                    .striped(true)
                    .show(ui, |ui| {
                        for (name, value) in anomaly_fields(row, &self.config.channel_aliases) {
                            ui.label(name);
                            ui.label(RichText::new(value).monospace());
                            ui.end_row();
                        }
                    });
            });

        if !open {
            self.inspected = None;
        }
    }
}

fn draw_axes(painter: &egui::Painter, plot: Rect, chart: &ChartData, x_range: (f64, f64)) {
    let axis_stroke = Stroke::new(1.0, Color32::from_gray(150));
    let grid_stroke = Stroke::new(1.0, Color32::from_gray(232));
    let tick_font = FontId::proportional(11.0);
    let text_color = Color32::from_gray(70);

    for step in 0..=Y_TICKS {
        let y = plot.bottom() - plot.height() * step as f32 / Y_TICKS as f32;
        painter.line_segment([pos2(plot.left(), y), pos2(plot.right(), y)], grid_stroke);
    }

    let (x_min, x_max) = x_range;
    for step in 0..=X_TICKS {
        let fraction = step as f64 / X_TICKS as f64;
        let x = plot.left() + plot.width() * fraction as f32;
        painter.line_segment([pos2(x, plot.top()), pos2(x, plot.bottom())], grid_stroke);
        painter.text(
            pos2(x, plot.bottom() + 6.0),
            Align2::CENTER_TOP,
            format_tick_time(x_min + (x_max - x_min) * fraction),
            tick_font.clone(),
            text_color,
        );
    }

    painter.line_segment([plot.left_bottom(), plot.right_bottom()], axis_stroke);

    for (axis, unit) in chart.units.units.iter().enumerate() {
        let Some(&(y_min, y_max)) = chart.y_ranges.get(axis) else {
            continue;
        };
        let (edge, align, offset) = if axis == 0 {
            (plot.left(), Align2::RIGHT_CENTER, -6.0)
        } else {
            (plot.right(), Align2::LEFT_CENTER, 6.0)
        };

        painter.line_segment([pos2(edge, plot.top()), pos2(edge, plot.bottom())], axis_stroke);
        for step in 0..=Y_TICKS {
            let fraction = step as f64 / Y_TICKS as f64;
            let y = plot.bottom() - plot.height() * fraction as f32;
            painter.text(
                pos2(edge + offset, y),
                align,
                format!("{:.1}", y_min + (y_max - y_min) * fraction),
                tick_font.clone(),
                text_color,
            );
        }
        painter.text(
            pos2(edge, plot.top() - 4.0),
            if axis == 0 { Align2::LEFT_BOTTOM } else { Align2::RIGHT_BOTTOM },
            unit.label(),
            FontId::proportional(12.0),
            text_color,
        );
    }
}
