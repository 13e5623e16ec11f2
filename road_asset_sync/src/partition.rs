//! The unit of work: one registry region and one asset type.

use std::fmt;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// Geometry kind of an asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Located by a single road address.
    Point,
    /// Located by a start and end road address.
    Linear,
}

/// Invocation payload of one partition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Partition {
    /// Registry region code, two digits (`"01"`..`"16"`).
    pub region_code: String,
    /// Human-readable asset type name, used in logs and notifications.
    pub asset_type_name: String,
    /// Destination asset type id.
    pub asset_type_id: i32,
    /// Point or linear.
    pub asset_type_kind: AssetKind,
    /// Registry class paths to fetch.
    pub source_paths: Vec<String>,
}

/// Registry region code to destination region number.
const REGION_CONVERSION: &[(&str, i32)] = &[
    ("16", 0),
    ("15", 1),
    ("13", 2),
    ("11", 3),
    ("10", 4),
    ("08", 5),
    ("05", 6),
    ("06", 7),
    ("01", 8),
    ("02", 9),
];

impl Partition {
    /// Destination region number of the registry region, or `None` when the
    /// region has no destination counterpart.
    pub fn destination_region(&self) -> Option<i32> {
        REGION_CONVERSION
            .iter()
            .find(|(code, _)| *code == self.region_code)
            .map(|&(_, region)| region)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.destination_region().is_none() {
            bail!("unknown region code {:?}", self.region_code);
        }
        if self.source_paths.is_empty() {
            bail!("partition {self} lists no source paths");
        }
        if self.source_paths.iter().any(|p| p.trim().is_empty()) {
            bail!("partition {self} has a blank source path");
        }
        Ok(())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region_code, self.asset_type_name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Partition),
    Many(Vec<Partition>),
}

/// Parses a partition payload: a single object or an array of objects.
pub fn load_partitions_str(s: &str) -> anyhow::Result<Vec<Partition>> {
    let parsed: OneOrMany = serde_json::from_str(s).context("parsing partition payload")?;
    let partitions = match parsed {
        OneOrMany::One(p) => vec![p],
        OneOrMany::Many(ps) => ps,
    };
    for p in &partitions {
        p.validate()?;
    }
    Ok(partitions)
}

/// Reads and parses a partition payload file.
pub fn load_partitions_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Vec<Partition>> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading partitions from {}", path.display()))?;
    load_partitions_str(&s)
}
