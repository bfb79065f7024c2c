mod label;
mod matching;
mod row;
mod tree;

pub use label::{display_label, top_segment};
pub use matching::find_best_match;
pub use row::{AnomalyRow, rows_from_payload};
pub use tree::{ExpansionState, TaxonomyNode, build_tree, expand_tree};
