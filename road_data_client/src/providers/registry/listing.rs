use indexmap::IndexMap;
use serde::Deserialize;
use snafu::ResultExt;

use crate::errors::{ClientError, NdjsonLineSnafu};

/// Region key used by the registry's partitioning of a source class.
pub const REGION_PARTITION: &str = "alueet/ely";

const REGION_PREFIX: &str = "ely/ely";

#[derive(Debug, Deserialize)]
pub(crate) struct ClassListing {
    #[serde(default)]
    jaottelut: IndexMap<String, IndexMap<String, PartitionEntry>>,
}

#[derive(Debug, Deserialize)]
struct PartitionEntry {
    polku: String,
}

impl ClassListing {
    /// Region code (`"01"`, `"16"`, ...) to data path, in listing order.
    pub(crate) fn region_paths(self) -> IndexMap<String, String> {
        self.jaottelut
            .into_iter()
            .filter(|(k, _)| k == REGION_PARTITION)
            .flat_map(|(_, regions)| regions)
            .map(|(key, entry)| {
                let region = key.strip_prefix(REGION_PREFIX).unwrap_or(&key).to_owned();
                (region, entry.polku)
            })
            .collect()
    }
}

/// Splits a newline-delimited JSON body into values, skipping blank lines.
/// Line numbers in errors are 1-based.
pub fn parse_ndjson(url: &str, body: &str) -> Result<Vec<serde_json::Value>, ClientError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).context(NdjsonLineSnafu { url, line: i + 1 })
        })
        .collect()
}
