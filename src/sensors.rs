//! Sensor time-series shaping for the dashboard: timestamp handling,
//! downsampling, chart axes and CSV export.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use tracing::info;

pub const LONG_RANGE_DAYS: i64 = 14;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub const CSV_COLUMNS: [&str; 18] = [
    "Timestamp", "Device", "t_ch0", "t_ch1", "t_ch2", "t_ch3", "t_ch4", "t_ch5", "t_ch6", "t_ch7",
    "v_ch0", "v_ch1", "v_ch2", "v_ch3", "v_ch4", "v_ch5", "v_ch6", "v_ch7",
];

/// Completes `HH:MM` style stamps with seconds, as the data service expects.
pub fn format_time_string(timestamp: &str) -> String {
    if timestamp.split(':').count() == 2 {
        format!("{timestamp}:00")
    } else {
        timestamp.to_owned()
    }
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// True when the requested window is longer than the service answers
/// comfortably.
pub fn exceeds_long_range(start: &str, end: &str) -> bool {
    match (parse_timestamp(start), parse_timestamp(end)) {
        (Some(start), Some(end)) => {
            (end - start).num_seconds() > LONG_RANGE_DAYS * 24 * 60 * 60
        }
        _ => false,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesPoint {
    /// Seconds since the Unix epoch.
    pub x: f64,
    pub y: f64,
}

pub fn sample_stride(len: usize, max_points: usize) -> usize {
    if max_points == 0 || len <= max_points {
        1
    } else {
        len.div_ceil(max_points)
    }
}

fn reading(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Builds one point series per selected channel, keyed by the channel's
/// alias.
///
/// Rows are thinned to every `ceil(len / max_points)`-th row before points
/// whose timestamp or reading cannot be parsed are dropped. `None` keeps
/// every row.
pub fn process_series(
    rows: &[Value],
    channels: &[String],
    aliases: &BTreeMap<String, String>,
    max_points: Option<usize>,
) -> BTreeMap<String, Vec<SeriesPoint>> {
    let stride = max_points.map_or(1, |max| sample_stride(rows.len(), max));

    channels
        .iter()
        .map(|channel| {
            let points = rows
                .iter()
                .step_by(stride)
                .filter_map(|row| {
                    let ts = row.get("ts").and_then(Value::as_str).and_then(parse_timestamp)?;
                    let y = reading(row.get(channel.as_str()))?;
                    Some(SeriesPoint {
                        x: ts.and_utc().timestamp_millis() as f64 / 1000.0,
                        y,
                    })
                })
                .collect::<Vec<_>>();
            let key = aliases.get(channel).cloned().unwrap_or_else(|| channel.clone());
            (key, points)
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisUnit {
    Temperature,
    Voltage,
}

impl AxisUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Voltage => "Voltage",
        }
    }

    fn of_channel(channel: &str) -> Option<Self> {
        if channel.starts_with("t_") {
            Some(Self::Temperature)
        } else if channel.starts_with("v_") {
            Some(Self::Voltage)
        } else {
            None
        }
    }
}

/// Value axes for the current channel selection and the axis each series
/// (by alias) is drawn against.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartUnits {
    pub units: Vec<AxisUnit>,
    pub axis_map: BTreeMap<String, usize>,
}

pub fn chart_units(selected: &[String], aliases: &BTreeMap<String, String>) -> ChartUnits {
    if selected.is_empty() {
        return ChartUnits::default();
    }

    let units = [AxisUnit::Temperature, AxisUnit::Voltage]
        .into_iter()
        .filter(|unit| {
            selected
                .iter()
                .any(|channel| AxisUnit::of_channel(channel) == Some(*unit))
        })
        .collect::<Vec<_>>();

    let axis_map = selected
        .iter()
        .map(|channel| {
            let axis = AxisUnit::of_channel(channel)
                .and_then(|unit| units.iter().position(|candidate| *candidate == unit))
                .unwrap_or(0);
            let alias = aliases.get(channel).cloned().unwrap_or_else(|| channel.clone());
            (alias, axis)
        })
        .collect();

    ChartUnits { units, axis_map }
}

fn csv_field(text: &str) -> Cow<'_, str> {
    if text.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}

fn cell_text(row: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

pub fn csv_header(aliases: &BTreeMap<String, String>) -> String {
    CSV_COLUMNS
        .iter()
        .map(|column| {
            let name = aliases.get(*column).map_or(*column, String::as_str);
            csv_field(name).into_owned()
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders raw sensor rows under the fixed export header, one line per row.
pub fn export_csv(rows: &[Value], aliases: &BTreeMap<String, String>) -> String {
    let mut out = csv_header(aliases);
    out.push('\n');

    for row in rows {
        let line = CSV_COLUMNS
            .iter()
            .map(|column| {
                let text = match *column {
                    "Timestamp" => cell_text(row, &["ts", "timestamp"]),
                    "Device" => cell_text(row, &["deviceid", "device", "dev"]),
                    channel => cell_text(row, &[channel]),
                };
                csv_field(&text).into_owned()
            })
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }

    out
}

pub fn write_csv(path: &Path, rows: &[Value], aliases: &BTreeMap<String, String>) -> Result<()> {
    fs::write(path, export_csv(rows, aliases))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "exported sensor data");
    Ok(())
}
