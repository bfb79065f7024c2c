use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::taxonomy::{
    AnomalyRow, ExpansionState, TaxonomyNode, build_tree, expand_tree, find_best_match,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Graph,
}

/// A click on a rendered graph node together with the modifier state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeClick {
    pub name: String,
    pub domain: String,
    pub has_templates: bool,
    pub is_template_leaf: bool,
    /// Shift was held.
    pub modifier: bool,
}

#[derive(Clone, Debug)]
pub enum ExplorerEvent {
    SetView(ViewMode),
    SetQuery(String),
    SelectRow(AnomalyRow),
    CloseDetail,
    NodeClicked(NodeClick),
    RowsFetched(Vec<AnomalyRow>),
    TaxonomyFetched(Value),
    FetchFailed(String),
    Teardown,
}

/// Everything the explorer shows, as a value. Every change goes through
/// [`ExplorerState::reduce`].
#[derive(Clone, Debug)]
pub struct ExplorerState {
    pub view: ViewMode,
    pub rows: Arc<[AnomalyRow]>,
    pub taxonomy: Value,
    pub base_tree: Arc<TaxonomyNode>,
    pub query: String,
    pub selected: Option<AnomalyRow>,
    pub expanded: ExpansionState,
    pub active: bool,
    /// Bumped whenever [`ExplorerState::expanded_tree`] would return a
    /// different tree.
    pub tree_revision: u64,
    pub last_error: Option<String>,
}

impl Default for ExplorerState {
    fn default() -> Self {
        Self::new(Vec::new(), Value::Object(Default::default()), ViewMode::default())
    }
}

impl ExplorerState {
    /// `rows` and `taxonomy` are what the explorer shows until, and unless,
    /// the live fetch replaces them.
    pub fn new(rows: Vec<AnomalyRow>, taxonomy: Value, view: ViewMode) -> Self {
        let base_tree = Arc::new(build_tree(&taxonomy));
        Self {
            view,
            rows: rows.into(),
            taxonomy,
            base_tree,
            query: String::new(),
            selected: None,
            expanded: ExpansionState::default(),
            active: true,
            tree_revision: 0,
            last_error: None,
        }
    }

    pub fn reduce(mut self, event: ExplorerEvent) -> Self {
        match event {
            ExplorerEvent::SetView(view) => self.view = view,
            ExplorerEvent::SetQuery(query) => self.query = query,
            ExplorerEvent::SelectRow(row) => self.selected = Some(row),
            ExplorerEvent::CloseDetail => self.selected = None,
            ExplorerEvent::NodeClicked(click) => return self.node_clicked(click),
            ExplorerEvent::Teardown => self.active = false,
            ExplorerEvent::RowsFetched(_)
            | ExplorerEvent::TaxonomyFetched(_)
            | ExplorerEvent::FetchFailed(_)
                if !self.active =>
            {
                debug!("discarding fetch result after teardown");
            }
            ExplorerEvent::RowsFetched(rows) => {
                if !rows.is_empty() {
                    self.rows = rows.into();
                    self.last_error = None;
                }
            }
            ExplorerEvent::TaxonomyFetched(taxonomy) => {
                if taxonomy.is_object() {
                    self.base_tree = Arc::new(build_tree(&taxonomy));
                    self.taxonomy = taxonomy;
                    self.tree_revision += 1;
                    self.last_error = None;
                } else {
                    warn!("ignoring taxonomy payload that is not an object");
                    self.last_error = Some("taxonomy payload is not an object".to_owned());
                }
            }
            ExplorerEvent::FetchFailed(message) => {
                error!("explorer fetch failed: {message}");
                self.last_error = Some(message);
            }
        }
        self
    }

    fn node_clicked(mut self, click: NodeClick) -> Self {
        if click.is_template_leaf {
            let row = match find_best_match(&self.rows, &click.domain, &click.name) {
                Some(found) => {
                    debug!(
                        template = %click.name,
                        reason = found.reason.label(),
                        "template matched"
                    );
                    found.row.clone()
                }
                None => AnomalyRow::placeholder(&click.domain, &click.name),
            };
            self.selected = Some(row);
        } else if click.has_templates {
            self.expanded = self.expanded.toggled(&click.name);
            self.tree_revision += 1;
        }

        if click.modifier {
            self.query = click.name;
            self.view = ViewMode::List;
        }

        self
    }

    /// Rows whose device, timestamp, classification or template contain the
    /// trimmed query, ignoring case. Order is preserved.
    pub fn filtered_rows(&self) -> Vec<&AnomalyRow> {
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return self.rows.iter().collect();
        }

        self.rows
            .iter()
            .filter(|row| row.search_haystack().contains(&query))
            .collect()
    }

    pub fn expanded_tree(&self) -> TaxonomyNode {
        expand_tree(&self.base_tree, &self.expanded)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(device: &str, classification: &str, template: &str) -> AnomalyRow {
        AnomalyRow {
            device: device.to_owned(),
            timestamp: "2025-03-01 10:00:00".to_owned(),
            classification: classification.to_owned(),
            template: template.to_owned(),
            ..AnomalyRow::default()
        }
    }

    fn sample() -> ExplorerState {
        ExplorerState::new(
            vec![
                row("edge_1", "Volt-related - Spikes", "sudden voltage spike"),
                row("edge_2", "Temp-related - Drift", "slow temperature drift"),
                row("edge_3", "Volt-related - Sag", "voltage sag under load"),
            ],
            json!({
                "Volt-related": { "Spikes": ["sudden voltage spike"], "Sag": ["voltage sag"] },
                "Temp-related": { "Drift": ["slow temperature drift"] },
            }),
            ViewMode::Graph,
        )
    }

    fn click(name: &str, domain: &str) -> NodeClick {
        NodeClick {
            name: name.to_owned(),
            domain: domain.to_owned(),
            ..NodeClick::default()
        }
    }

    #[test]
    fn empty_query_returns_all_rows_in_order() {
        let state = sample();
        let devices = state
            .filtered_rows()
            .iter()
            .map(|row| row.device.as_str())
            .collect::<Vec<_>>();
        assert_eq!(devices, vec!["edge_1", "edge_2", "edge_3"]);

        let state = state.reduce(ExplorerEvent::SetQuery("   ".to_owned()));
        assert_eq!(state.filtered_rows().len(), 3);
    }

    #[test]
    fn query_matches_any_field_ignoring_case() {
        let state = sample().reduce(ExplorerEvent::SetQuery("  VOLT-RELATED ".to_owned()));
        let devices = state
            .filtered_rows()
            .iter()
            .map(|row| row.device.as_str())
            .collect::<Vec<_>>();
        assert_eq!(devices, vec!["edge_1", "edge_3"]);

        let state = state.reduce(ExplorerEvent::SetQuery("edge_2".to_owned()));
        assert_eq!(state.filtered_rows().len(), 1);

        let state = state.reduce(ExplorerEvent::SetQuery("2025-03-01".to_owned()));
        assert_eq!(state.filtered_rows().len(), 3);
    }

    #[test]
    fn template_leaf_click_selects_best_row() {
        let leaf = NodeClick {
            is_template_leaf: true,
            ..click("sudden voltage spike", "Volt-related")
        };
        let state = sample().reduce(ExplorerEvent::NodeClicked(leaf));
        let selected = state.selected.expect("row selected");
        assert_eq!(selected.device, "edge_1");
        assert_eq!(state.view, ViewMode::Graph);
    }

    #[test]
    fn template_leaf_without_rows_selects_placeholder() {
        let state = ExplorerState::new(Vec::new(), json!({}), ViewMode::Graph);
        let leaf = NodeClick {
            is_template_leaf: true,
            ..click("phantom pattern", "Pressure-related")
        };
        let state = state.reduce(ExplorerEvent::NodeClicked(leaf));
        let selected = state.selected.expect("placeholder selected");
        assert_eq!(selected.timestamp, "N/A");
        assert_eq!(selected.classification, "Pressure-related");
        assert_eq!(selected.template, "phantom pattern");
        assert!(selected.contributions.is_empty());
    }

    #[test]
    fn group_click_toggles_expansion() {
        let group = NodeClick {
            has_templates: true,
            ..click("Spikes", "Volt-related")
        };
        let base_count = sample().expanded_tree().node_count();

        let state = sample().reduce(ExplorerEvent::NodeClicked(group.clone()));
        assert!(state.expanded.is_expanded("Spikes"));
        assert_eq!(state.tree_revision, 1);
        assert_eq!(state.expanded_tree().node_count(), base_count + 1);
        assert!(state.selected.is_none());

        let state = state.reduce(ExplorerEvent::NodeClicked(group));
        assert!(!state.expanded.is_expanded("Spikes"));
        assert_eq!(state.expanded_tree().node_count(), base_count);
    }

    #[test]
    fn click_on_group_without_templates_changes_nothing() {
        let state =
            sample().reduce(ExplorerEvent::NodeClicked(click("Volt-related", "Volt-related")));
        assert_eq!(state.tree_revision, 0);
        assert!(!state.expanded.is_expanded("Volt-related"));
        assert!(state.query.is_empty());
    }

    #[test]
    fn modifier_click_filters_and_composes_with_toggle() {
        let group = NodeClick {
            has_templates: true,
            modifier: true,
            ..click("Spikes", "Volt-related")
        };
        let state = sample().reduce(ExplorerEvent::NodeClicked(group));
        assert!(state.expanded.is_expanded("Spikes"));
        assert_eq!(state.query, "Spikes");
        assert_eq!(state.view, ViewMode::List);
        assert_eq!(state.filtered_rows().len(), 1);
    }

    #[test]
    fn modifier_click_on_template_leaf_also_selects() {
        let leaf = NodeClick {
            is_template_leaf: true,
            modifier: true,
            ..click("slow temperature drift", "Temp-related")
        };
        let state = sample().reduce(ExplorerEvent::NodeClicked(leaf));
        assert_eq!(state.selected.map(|row| row.device).as_deref(), Some("edge_2"));
        assert_eq!(state.query, "slow temperature drift");
        assert_eq!(state.view, ViewMode::List);
    }

    #[test]
    fn fetched_rows_replace_only_when_non_empty() {
        let state = sample().reduce(ExplorerEvent::RowsFetched(Vec::new()));
        assert_eq!(state.rows.len(), 3);

        let state = state.reduce(ExplorerEvent::RowsFetched(vec![row("edge_9", "X", "y")]));
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].device, "edge_9");
    }

    #[test]
    fn fetched_taxonomy_must_be_an_object() {
        let state = sample().reduce(ExplorerEvent::TaxonomyFetched(json!(["not", "a", "tree"])));
        assert_eq!(state.base_tree.children.len(), 2);
        assert_eq!(state.tree_revision, 0);
        assert_eq!(
            state.last_error.as_deref(),
            Some("taxonomy payload is not an object")
        );

        let state = state.reduce(ExplorerEvent::TaxonomyFetched(json!({ "Humidity": ["damp"] })));
        assert_eq!(state.base_tree.children.len(), 1);
        assert_eq!(state.base_tree.children[0].name, "Humidity");
        assert_eq!(state.tree_revision, 1);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn results_after_teardown_are_discarded() {
        let state = sample().reduce(ExplorerEvent::Teardown);
        let state = state
            .reduce(ExplorerEvent::RowsFetched(vec![row("late", "X", "y")]))
            .reduce(ExplorerEvent::TaxonomyFetched(json!({ "Late": [] })))
            .reduce(ExplorerEvent::FetchFailed("late failure".to_owned()));

        assert!(!state.active);
        assert_eq!(state.rows.len(), 3);
        assert_eq!(state.base_tree.children.len(), 2);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn results_apply_in_arrival_order() {
        let state = sample()
            .reduce(ExplorerEvent::TaxonomyFetched(json!({ "Humidity": { "Damp": ["damp air"] } })))
            .reduce(ExplorerEvent::RowsFetched(vec![row("edge_7", "Humidity - Damp", "damp air")]));
        assert_eq!(state.base_tree.children[0].name, "Humidity");
        assert_eq!(state.rows[0].device, "edge_7");
    }

    #[test]
    fn failure_keeps_prior_data() {
        let state = sample().reduce(ExplorerEvent::FetchFailed("connection refused".to_owned()));
        assert_eq!(state.rows.len(), 3);
        assert_eq!(state.base_tree.children.len(), 2);
        assert_eq!(state.last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn later_success_clears_the_error() {
        let failed = sample().reduce(ExplorerEvent::FetchFailed("timeout".to_owned()));

        let state = failed
            .clone()
            .reduce(ExplorerEvent::RowsFetched(vec![row("edge_2", "X", "y")]));
        assert!(state.last_error.is_none());

        let state = failed
            .clone()
            .reduce(ExplorerEvent::TaxonomyFetched(json!({ "Humidity": [] })));
        assert!(state.last_error.is_none());

        let state = failed.reduce(ExplorerEvent::RowsFetched(Vec::new()));
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn detail_panel_opens_and_closes() {
        let state = sample().reduce(ExplorerEvent::SelectRow(row("edge_5", "X", "t")));
        assert!(state.selected.is_some());
        assert!(state.reduce(ExplorerEvent::CloseDetail).selected.is_none());
    }
}
