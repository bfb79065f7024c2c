use std::collections::HashSet;

use crate::util::{normalize_text, tokenize};

use super::label::top_segment;
use super::row::AnomalyRow;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchReason {
    Exact,
    Similar { score: f64 },
}

impl MatchReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Similar { .. } => "similar",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BestMatch<'a> {
    pub row: &'a AnomalyRow,
    pub reason: MatchReason,
}

/// `|A ∩ B| / |A ∪ B|`, zero when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.iter().filter(|word| b.contains(*word)).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Resolves the anomaly row that most plausibly produced `template`.
///
/// A normalized containment match in either direction wins outright, in row
/// order. Otherwise rows are ranked by token Jaccard similarity, restricted to
/// the hint's top-level domain when any row falls inside it. Ties keep the
/// earliest row.
pub fn find_best_match<'a>(
    rows: &'a [AnomalyRow],
    domain_hint: &str,
    template: &str,
) -> Option<BestMatch<'a>> {
    let query = normalize_text(template);

    let exact = rows.iter().find(|row| {
        let candidate = normalize_text(&row.template);
        candidate == query || candidate.contains(&query) || query.contains(&candidate)
    });
    if let Some(row) = exact {
        return Some(BestMatch {
            row,
            reason: MatchReason::Exact,
        });
    }

    let domain = top_segment(domain_hint);
    let pool = rows
        .iter()
        .filter(|row| row.classification.starts_with(domain))
        .collect::<Vec<_>>();
    let candidates = if pool.is_empty() {
        rows.iter().collect::<Vec<_>>()
    } else {
        pool
    };

    let query_tokens = tokenize(&query);
    let mut best: Option<(&AnomalyRow, f64)> = None;
    for row in candidates {
        let score = jaccard(&query_tokens, &tokenize(&row.template));
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((row, score));
        }
    }

    best.map(|(row, score)| BestMatch {
        row,
        reason: MatchReason::Similar { score },
    })
}
