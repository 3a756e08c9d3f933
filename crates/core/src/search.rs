use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::model::{RecordId, Tree};

/// Resolves `needle` to a record: an exact id wins, then an exact label
/// (case-insensitive), then the best fuzzy label match. Ties keep the
/// shallowest, first-visited node.
pub fn find_by_label(tree: &Tree, needle: &str) -> Option<RecordId> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    if let Some(node) = tree.find_node(&RecordId::from(needle)) {
        return Some(node.record.clone());
    }
    let order = tree.descendants();
    if let Some(n) = order
        .iter()
        .map(|&id| tree.node(id))
        .find(|n| n.label().eq_ignore_ascii_case(needle))
    {
        return Some(n.record.clone());
    }

    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, RecordId)> = None;
    for id in order {
        let n = tree.node(id);
        let Some(score) = matcher.fuzzy_match(n.label(), needle) else {
            continue;
        };
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, n.record.clone()));
        }
    }
    tracing::debug!(needle, found = ?best, "label lookup");
    best.map(|(_, id)| id)
}
