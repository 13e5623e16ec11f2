//! Destination store: reads of active records and network links, and the
//! three transactional write operations.
//!
//! Each write call is one transaction. A failure rolls back that call only
//! and surfaces as an integrity error; writes are never retried.

mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::SyncError,
    model::{DestinationRecord, NewAssetRow, RoadLink, SupersedeRow},
};

pub use pg::PgStore;

/// `link_source` value of the normal link interface.
pub const LINK_SOURCE_NORMAL: i32 = 1;

/// Identities stamped on rows the synchronizer writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriterIdentity {
    /// Creator of new rows.
    #[serde(default = "default_created_by")]
    pub created_by: String,
    /// Modifier of expired and superseded rows.
    #[serde(default = "default_modified_by")]
    pub modified_by: String,
}

fn default_created_by() -> String {
    "Tievelho-import".into()
}

fn default_modified_by() -> String {
    "Tievelho-update".into()
}

impl Default for WriterIdentity {
    fn default() -> Self {
        Self {
            created_by: default_created_by(),
            modified_by: default_modified_by(),
        }
    }
}

/// Reads and writes against the destination database.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Municipality codes of a destination region.
    async fn municipalities(&self, region: i32) -> Result<Vec<i32>, SyncError>;

    /// Active records of an asset type in the given municipalities, one per
    /// position.
    async fn active_records(
        &self,
        asset_type_id: i32,
        municipalities: &[i32],
    ) -> Result<Vec<DestinationRecord>, SyncError>;

    /// The subset of `link_ids` that are public road links, with their
    /// traffic direction and shape.
    async fn public_road_links(&self, link_ids: &[String]) -> Result<Vec<RoadLink>, SyncError>;

    /// Ends the validity of active records. Returns the number expired.
    async fn expire(&self, ids: &[i64], writer: &WriterIdentity) -> Result<usize, SyncError>;

    /// Creates records with their positions and properties.
    async fn insert(
        &self,
        asset_type_id: i32,
        rows: &[NewAssetRow],
        writer: &WriterIdentity,
    ) -> Result<usize, SyncError>;

    /// Expires the replaced records and inserts their new versions, keeping
    /// the original creator and creation time.
    async fn supersede(
        &self,
        asset_type_id: i32,
        rows: &[SupersedeRow],
        writer: &WriterIdentity,
    ) -> Result<usize, SyncError>;
}

/// Value of `lrm_position.adjusted_timestamp` for rows written at `now`:
/// the start of the UTC day minus five hours, in epoch milliseconds.
pub fn adjusted_timestamp(now: DateTime<Utc>) -> i64 {
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const OFFSET_MS: i64 = 5 * 60 * 60 * 1000;
    let ms = now.timestamp_millis();
    ms - ms.rem_euclid(DAY_MS) - OFFSET_MS
}
