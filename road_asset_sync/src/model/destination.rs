use chrono::NaiveDateTime;
use diesel::Queryable;

/// Separator between constituent external ids of a merged linear record.
pub const EXTERNAL_ID_SEPARATOR: char = ',';

/// An active record in the destination store, one row per asset position.
#[derive(Debug, Clone, PartialEq, Queryable)]
pub struct DestinationRecord {
    /// Internal id.
    pub id: i64,
    /// External id, or several joined with [`EXTERNAL_ID_SEPARATOR`].
    pub external_id: Option<String>,
    /// Creator identity.
    pub created_by: Option<String>,
    /// Creation time.
    pub created_date: Option<NaiveDateTime>,
    /// Last modifier identity.
    pub modified_by: Option<String>,
    /// Last modification time.
    pub modified_date: Option<NaiveDateTime>,
    /// End of validity; `None` while active.
    pub valid_to: Option<NaiveDateTime>,
    /// Network link the record is positioned on.
    pub link_id: String,
    /// Start measure on the link.
    pub start_measure: Option<f64>,
    /// End measure on the link.
    pub end_measure: Option<f64>,
    /// Municipality of the link.
    pub municipality_code: Option<i32>,
}

impl DestinationRecord {
    /// Constituent external ids. Empty for records created outside the sync.
    pub fn external_ids(&self) -> Vec<&str> {
        self.external_id
            .as_deref()
            .map(|ids| {
                ids.split(EXTERNAL_ID_SEPARATOR)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Modification time, falling back to creation time.
    pub fn last_changed(&self) -> Option<NaiveDateTime> {
        self.modified_date.or(self.created_date)
    }
}

/// Joins constituent ids the way they are persisted.
pub fn join_external_ids<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&EXTERNAL_ID_SEPARATOR.to_string())
}
