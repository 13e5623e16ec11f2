//! Link-local merging of contiguous, attribute-identical linear segments.
//!
//! Two candidates on the same link merge when one ends exactly where the other
//! starts (no tolerance) and their derived values and side codes are equal.
//! Candidates are sorted by a total order (start, end, ids) and only sort
//! neighbours are compared; the scan repeats until a pass merges nothing.
//! The result does not depend on the input order.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::model::{OutputValue, SideCode};

/// Working record of the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeCandidate {
    /// Contributing external ids, in position order.
    pub external_ids: Vec<String>,
    /// Link id; merging never crosses links.
    pub link_id: String,
    /// Start measure, strictly less than `end`.
    pub start: f64,
    /// End measure.
    pub end: f64,
    /// Derived output value compared for equality.
    pub value: OutputValue,
    /// Municipality of the first contributing segment.
    pub municipality_code: Option<i32>,
    /// Side code of the segment.
    pub side_code: SideCode,
}

impl MergeCandidate {
    fn order(&self, other: &Self) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then(self.end.total_cmp(&other.end))
            .then_with(|| self.external_ids.cmp(&other.external_ids))
    }

    fn continues_with(&self, next: &Self) -> bool {
        self.end == next.start && self.value == next.value && self.side_code == next.side_code
    }
}

/// Merges candidates link by link. The output is ordered by link id and then
/// by position.
pub fn merge_segments(candidates: Vec<MergeCandidate>) -> Vec<MergeCandidate> {
    let mut by_link: BTreeMap<String, Vec<MergeCandidate>> = BTreeMap::new();
    for c in candidates {
        by_link.entry(c.link_id.clone()).or_default().push(c);
    }
    by_link.into_values().flat_map(merge_link).collect()
}

fn merge_link(mut group: Vec<MergeCandidate>) -> Vec<MergeCandidate> {
    loop {
        group.sort_by(MergeCandidate::order);
        let before = group.len();
        let mut merged: Vec<MergeCandidate> = Vec::with_capacity(before);
        for c in group {
            match merged.last_mut() {
                Some(head) if head.continues_with(&c) => {
                    head.end = c.end;
                    head.external_ids.extend(c.external_ids);
                }
                _ => merged.push(c),
            }
        }
        group = merged;
        if group.len() == before {
            return group;
        }
    }
}
