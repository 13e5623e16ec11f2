use std::fmt;

use serde::Serialize;

use crate::partition::Partition;

/// Counts collected during one partition run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    /// Registry region code.
    pub region_code: String,
    /// Asset type name.
    pub asset_type_name: String,
    /// Records fetched from every source path.
    pub fetched: usize,
    /// Records left after the strategy's filter.
    pub eligible: usize,
    /// Diff: new records.
    pub added: usize,
    /// Diff: changed records.
    pub updated: usize,
    /// Diff: current records.
    pub unchanged: usize,
    /// Destination records expired.
    pub expired: usize,
    /// Updates the strategy does not version.
    pub updates_skipped: usize,
    /// Assets the converter could not place.
    pub unresolved: usize,
    /// Assets whose every link is missing from the public network.
    pub missing_link: usize,
    /// Assets without a derivable value.
    pub without_value: usize,
    /// Sources left as they are because a record they share could not be
    /// rebuilt from every source it covers.
    pub held_back: usize,
    /// Rows inserted as new records.
    pub inserted: usize,
    /// Rows written as new versions of existing records.
    pub superseded: usize,
}

impl PartitionReport {
    /// Empty report labelled with the partition.
    pub fn for_partition(partition: &Partition) -> Self {
        Self {
            region_code: partition.region_code.clone(),
            asset_type_name: partition.asset_type_name.clone(),
            ..Self::default()
        }
    }

    /// Assets dropped after the diff for lack of a location or value.
    pub fn dropped(&self) -> usize {
        self.unresolved + self.missing_link + self.without_value
    }
}

impl fmt::Display for PartitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: fetched {} eligible {} | added {} updated {} unchanged {} expired {} | \
             dropped {} skipped {} held {} | inserted {} superseded {}",
            self.region_code,
            self.asset_type_name,
            self.fetched,
            self.eligible,
            self.added,
            self.updated,
            self.unchanged,
            self.expired,
            self.dropped(),
            self.updates_skipped,
            self.held_back,
            self.inserted,
            self.superseded,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_summary() {
        let report = PartitionReport {
            region_code: "01".into(),
            asset_type_name: "railings".into(),
            fetched: 12,
            eligible: 10,
            added: 3,
            updated: 1,
            unchanged: 6,
            expired: 2,
            unresolved: 1,
            missing_link: 1,
            inserted: 2,
            superseded: 1,
            ..PartitionReport::default()
        };
        insta::assert_snapshot!(report.to_string(), @"01/railings: fetched 12 eligible 10 | added 3 updated 1 unchanged 6 expired 2 | dropped 2 skipped 0 held 0 | inserted 2 superseded 1");
    }
}
