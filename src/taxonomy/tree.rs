use std::collections::BTreeMap;

use serde_json::Value;

const ROOT_NAME: &str = "root";

/// One node of the category tree.
///
/// Every node below a domain node carries that domain's name in `domain`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaxonomyNode {
    pub name: String,
    pub domain: String,
    pub children: Vec<TaxonomyNode>,
    pub templates: Vec<String>,
    pub is_template_leaf: bool,
}

impl TaxonomyNode {
    fn group(name: &str, domain: &str, children: Vec<TaxonomyNode>) -> Self {
        Self {
            name: name.to_owned(),
            domain: domain.to_owned(),
            children,
            ..Self::default()
        }
    }

    fn leaf(name: &str, domain: &str, templates: Vec<String>) -> Self {
        Self {
            name: name.to_owned(),
            domain: domain.to_owned(),
            templates,
            ..Self::default()
        }
    }

    fn template_leaf(text: &str, domain: &str) -> Self {
        Self {
            name: text.to_owned(),
            domain: domain.to_owned(),
            is_template_leaf: true,
            ..Self::default()
        }
    }

    pub fn has_templates(&self) -> bool {
        !self.templates.is_empty()
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

/// Which group nodes currently show their templates as child nodes, keyed by
/// node name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpansionState {
    flags: BTreeMap<String, bool>,
}

impl ExpansionState {
    pub fn is_expanded(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set(&mut self, name: &str, expanded: bool) {
        self.flags.insert(name.to_owned(), expanded);
    }

    pub fn toggled(mut self, name: &str) -> Self {
        let next = !self.is_expanded(name);
        self.set(name, next);
        self
    }
}

impl<const N: usize> From<[(&str, bool); N]> for ExpansionState {
    fn from(entries: [(&str, bool); N]) -> Self {
        Self {
            flags: entries
                .into_iter()
                .map(|(name, expanded)| (name.to_owned(), expanded))
                .collect(),
        }
    }
}

/// Builds the category tree below a synthetic, unrendered root whose children
/// are the top-level domains.
pub fn build_tree(taxonomy: &Value) -> TaxonomyNode {
    let children = taxonomy
        .as_object()
        .map(|domains| {
            domains
                .iter()
                .map(|(name, value)| build_node(value, name, name))
                .collect()
        })
        .unwrap_or_default();

    TaxonomyNode::group(ROOT_NAME, "", children)
}

fn build_node(value: &Value, name: &str, domain: &str) -> TaxonomyNode {
    match value {
        Value::Array(items) => {
            TaxonomyNode::leaf(name, domain, items.iter().map(stringify).collect())
        }
        Value::Object(entries) => {
            let children = entries
                .iter()
                .map(|(child_name, child_value)| build_node(child_value, child_name, domain))
                .collect();
            TaxonomyNode::group(name, domain, children)
        }
        scalar => TaxonomyNode::leaf(name, domain, vec![stringify(scalar)]),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Copy of `tree` in which every expanded node owning templates gains one
/// template-leaf child per template, after its existing children.
pub fn expand_tree(tree: &TaxonomyNode, expansion: &ExpansionState) -> TaxonomyNode {
    let mut children = tree
        .children
        .iter()
        .map(|child| expand_tree(child, expansion))
        .collect::<Vec<_>>();

    if tree.has_templates() && expansion.is_expanded(&tree.name) {
        children.extend(
            tree.templates
                .iter()
                .map(|text| TaxonomyNode::template_leaf(text, &tree.domain)),
        );
    }

    TaxonomyNode {
        name: tree.name.clone(),
        domain: tree.domain.clone(),
        children,
        templates: tree.templates.clone(),
        is_template_leaf: tree.is_template_leaf,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> TaxonomyNode {
        build_tree(&json!({ "A": { "B": ["t1", "t2"] } }))
    }

    #[test]
    fn builds_domain_and_group_nodes() {
        let root = sample();
        assert_eq!(root.name, ROOT_NAME);
        assert_eq!(root.children.len(), 1);

        let a = &root.children[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.domain, "A");
        assert!(a.templates.is_empty());
        assert_eq!(a.children.len(), 1);

        let b = &a.children[0];
        assert_eq!(b.name, "B");
        assert_eq!(b.domain, "A");
        assert_eq!(b.templates, vec!["t1", "t2"]);
        assert!(b.children.is_empty());
        assert!(!b.is_template_leaf);
    }

    #[test]
    fn domain_propagates_through_every_level() {
        let root = build_tree(&json!({
            "Volt-related": { "Peaks": { "Dominant": ["a"], "Weak": ["b"] } },
            "Temp-related": ["c"],
        }));

        fn assert_domain(node: &TaxonomyNode, domain: &str) {
            assert_eq!(node.domain, domain);
            for child in &node.children {
                assert_domain(child, domain);
            }
        }

        assert_domain(&root.children[0], "Volt-related");
        assert_domain(&root.children[1], "Temp-related");
        assert_eq!(root.children[1].templates, vec!["c"]);
    }

    #[test]
    fn keeps_key_order_of_the_source_object() {
        let root = build_tree(&json!({ "Zeta": [], "Alpha": [], "Mid": [] }));
        let names = root.children.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn scalars_become_single_template_leaves() {
        let root = build_tree(&json!({ "D": { "n": 3, "s": "text", "z": null, "l": [1, "x"] } }));
        let d = &root.children[0];
        assert_eq!(d.children[0].templates, vec!["3"]);
        assert_eq!(d.children[1].templates, vec!["text"]);
        assert_eq!(d.children[2].templates, vec!["null"]);
        assert_eq!(d.children[3].templates, vec!["1", "x"]);
    }

    #[test]
    fn non_object_taxonomy_yields_empty_root() {
        assert!(build_tree(&json!([1, 2])).children.is_empty());
        assert!(build_tree(&Value::Null).children.is_empty());
    }

    #[test]
    fn expansion_adds_template_leaves() {
        let base = sample();
        let expanded = expand_tree(&base, &ExpansionState::from([("B", true)]));

        let b = &expanded.children[0].children[0];
        assert_eq!(b.children.len(), 2);
        for (child, text) in b.children.iter().zip(["t1", "t2"]) {
            assert_eq!(child.name, text);
            assert_eq!(child.domain, "A");
            assert!(child.is_template_leaf);
            assert!(child.templates.is_empty());
            assert!(child.children.is_empty());
        }
        assert_eq!(b.templates, vec!["t1", "t2"]);
    }

    #[test]
    fn empty_expansion_leaves_tree_unchanged() {
        let base = sample();
        assert_eq!(expand_tree(&base, &ExpansionState::default()), base);
        assert_eq!(expand_tree(&base, &ExpansionState::from([("B", false)])), base);
    }

    #[test]
    fn expansion_never_accretes() {
        let base = sample();
        let state = ExpansionState::from([("B", true)]);
        let once = expand_tree(&base, &state);
        let again = expand_tree(&base, &state);
        assert_eq!(once, again);
        assert_eq!(once.node_count(), base.node_count() + 2);
    }

    #[test]
    fn toggling_flips_a_single_flag() {
        let state = ExpansionState::default().toggled("B");
        assert!(state.is_expanded("B"));
        assert!(!state.is_expanded("A"));
        assert!(!state.toggled("B").is_expanded("B"));
    }
}
