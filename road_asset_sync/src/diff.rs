//! Classification of source records against active destination records.
//!
//! Records are matched by external id. A destination record may carry several
//! ids when linear segments were merged before persisting; such a record stays
//! intact only while every one of its ids is still present in the source.
//! Rewriting a merged record needs every source that contributed to it, so
//! sources sharing a record with an accepted update are carried along.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use indexmap::IndexMap;

use crate::{
    error::SyncError,
    model::{DestinationRecord, SourceAsset},
};

/// Outcome of one diff.
///
/// `added`, `updated` and `unchanged` partition the source records;
/// `expired` and the records listed in `replaced` (plus those of unchanged
/// sources) partition the destination records that carry an external id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Sources with no intact active record.
    pub added: Vec<SourceAsset>,
    /// Sources changed after their record was last written.
    pub updated: Vec<SourceAsset>,
    /// Updated sources whose update is not applied. Also listed in `updated`.
    pub skipped: Vec<SourceAsset>,
    /// Sources whose record is current.
    pub unchanged: Vec<SourceAsset>,
    /// Active records with at least one id missing from the source.
    pub expired: Vec<DestinationRecord>,
    /// Unchanged or skipped sources that share a record, directly or through
    /// other shared records, with an accepted update.
    pub carried: Vec<SourceAsset>,
    /// Intact records of each rewritten source, keyed by external id.
    pub replaced: IndexMap<String, Vec<DestinationRecord>>,
}

impl DiffResult {
    /// Sources whose records are rewritten: accepted updates, then carried
    /// sources.
    pub fn rewritten(&self) -> impl Iterator<Item = &SourceAsset> {
        self.updated
            .iter()
            .filter(|s| !self.skipped.iter().any(|k| k.oid == s.oid))
            .chain(&self.carried)
    }

    /// True if there is nothing to write.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.expired.is_empty()
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote_any = false;
        let mut section = |title: &str, lines: Vec<String>| -> fmt::Result {
            if lines.is_empty() {
                return Ok(());
            }
            if wrote_any {
                writeln!(f)?;
            }
            writeln!(f, "{title}")?;
            writeln!(f, "{}", "-".repeat(title.len()))?;
            for line in lines {
                writeln!(f, "{line}")?;
            }
            wrote_any = true;
            Ok(())
        };

        section(
            "Added",
            self.added.iter().map(|s| format!("+ {}", s.oid)).collect(),
        )?;
        section(
            "Updated",
            self.updated.iter().map(|s| format!("~ {}", s.oid)).collect(),
        )?;
        section(
            "Expired",
            self.expired
                .iter()
                .map(|r| format!("- {} (#{})", r.external_id.as_deref().unwrap_or(""), r.id))
                .collect(),
        )?;

        if !wrote_any {
            write!(f, "No changes")?;
        }
        Ok(())
    }
}

/// Classifies `source` against `destination`, accepting every update.
pub fn diff(
    source: Vec<SourceAsset>,
    destination: Vec<DestinationRecord>,
) -> Result<DiffResult, SyncError> {
    diff_with(source, destination, |_| true)
}

/// Classifies `source` against `destination`.
///
/// A matched source is updated when its modification time (or creation time)
/// is strictly later than the latest modification (or creation) time of its
/// records. Each source is classified on its own timestamps. Updates that
/// `accepts_update` rejects are reported in [`DiffResult::skipped`]; sources
/// that share a merged record with an accepted update are reported in
/// [`DiffResult::carried`]. Fails only on malformed source timestamps.
pub fn diff_with<F>(
    source: Vec<SourceAsset>,
    destination: Vec<DestinationRecord>,
    accepts_update: F,
) -> Result<DiffResult, SyncError>
where
    F: Fn(&SourceAsset) -> bool,
{
    let mut src: IndexMap<String, SourceAsset> = IndexMap::with_capacity(source.len());
    for s in source {
        src.entry(s.oid.clone()).or_insert(s);
    }

    let mut records: IndexMap<i64, DestinationRecord> = IndexMap::new();
    for r in destination {
        records.entry(r.id).or_insert(r);
    }

    let mut result = DiffResult::default();
    let mut intact: Vec<DestinationRecord> = Vec::new();
    for r in records.into_values() {
        let ids = r.external_ids();
        if ids.is_empty() {
            continue;
        }
        if ids.iter().all(|id| src.contains_key(*id)) {
            intact.push(r);
        } else {
            result.expired.push(r);
        }
    }

    let mut by_oid: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, r) in intact.iter().enumerate() {
        for id in r.external_ids() {
            by_oid.entry(id.to_owned()).or_default().push(i);
        }
    }

    let mut updated: HashSet<&str> = HashSet::new();
    for (oid, s) in &src {
        let Some(idx) = by_oid.get(oid) else { continue };
        let source_ts = s.last_changed()?;
        let dest_ts = idx.iter().filter_map(|&i| intact[i].last_changed()).max();
        if dest_ts.is_none_or(|d| source_ts > d) {
            updated.insert(oid.as_str());
        }
    }

    // Sources sharing an intact record belong to one group; a group with an
    // accepted update is rewritten as a whole.
    let mut groups = RecordGroups::new(intact.len());
    for idx in by_oid.values() {
        for pair in idx.windows(2) {
            groups.union(pair[0], pair[1]);
        }
    }
    let mut rewritten: HashSet<usize> = HashSet::new();
    for oid in updated.iter().filter(|oid| accepts_update(&src[**oid])) {
        for &i in &by_oid[*oid] {
            rewritten.insert(groups.find(i));
        }
    }

    for (oid, s) in &src {
        let Some(idx) = by_oid.get(oid) else {
            result.added.push(s.clone());
            continue;
        };
        let is_updated = updated.contains(oid.as_str());
        let accepted = is_updated && accepts_update(s);
        let in_rewrite = idx.iter().any(|&i| rewritten.contains(&groups.find(i)));
        if in_rewrite {
            result
                .replaced
                .insert(oid.clone(), idx.iter().map(|&i| intact[i].clone()).collect());
        }
        if is_updated {
            result.updated.push(s.clone());
            if !accepted {
                result.skipped.push(s.clone());
            }
        } else {
            result.unchanged.push(s.clone());
        }
        if in_rewrite && !accepted {
            result.carried.push(s.clone());
        }
    }

    Ok(result)
}

/// Disjoint sets over record indices.
struct RecordGroups {
    parent: Vec<usize>,
}

impl RecordGroups {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
