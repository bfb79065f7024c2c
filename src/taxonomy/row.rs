use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CONTRIBUTION_PREFIX: &str = "contribution_";

/// One detected anomaly event as shown in the list and detail views.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRow {
    pub device: String,
    pub timestamp: String,
    pub classification: String,
    pub score: Option<f64>,
    pub template: String,
    pub contributions: BTreeMap<String, f64>,
}

impl AnomalyRow {
    /// Normalizes one raw row, accepting `dev`/`ts`/`overall_anomaly_score`
    /// spellings and collecting every `contribution_<channel>` field.
    pub fn from_value(raw: &Value) -> Self {
        let Some(fields) = raw.as_object() else {
            return Self::default();
        };

        let contributions = fields
            .iter()
            .filter_map(|(key, value)| {
                let channel = key.strip_prefix(CONTRIBUTION_PREFIX)?;
                number(value).map(|score| (channel.to_owned(), score))
            })
            .collect();

        Self {
            device: first_text(fields, &["device", "dev"]),
            timestamp: first_text(fields, &["ts", "timestamp"]),
            classification: first_text(fields, &["classification"]),
            score: first_present(fields, &["overall_anomaly_score", "score"]).and_then(number),
            template: first_text(fields, &["template"]),
            contributions,
        }
    }

    /// Stand-in shown when a template leaf has no matching row.
    pub fn placeholder(domain: &str, template: &str) -> Self {
        Self {
            timestamp: "N/A".to_owned(),
            classification: domain.to_owned(),
            template: template.to_owned(),
            ..Self::default()
        }
    }

    /// Largest contributions first.
    pub fn top_contributions(&self, limit: usize) -> Vec<(&str, f64)> {
        let mut entries = self
            .contributions
            .iter()
            .map(|(channel, score)| (channel.as_str(), *score))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries.truncate(limit);
        entries
    }

    pub fn search_haystack(&self) -> String {
        [
            self.device.as_str(),
            self.timestamp.as_str(),
            self.classification.as_str(),
            self.template.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}

/// Rows from a `get_anomaly_list` body, which is either
/// `{"anomaly_list": [...]}` or a bare array.
pub fn rows_from_payload(payload: &Value) -> Vec<AnomalyRow> {
    let list = payload
        .get("anomaly_list")
        .filter(|value| !value.is_null())
        .unwrap_or(payload);

    list.as_array()
        .map(|items| items.iter().map(AnomalyRow::from_value).collect())
        .unwrap_or_default()
}

fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> String {
    match first_present(fields, keys) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
