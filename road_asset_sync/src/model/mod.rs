//! Records flowing through a partition run.
//!
//! - [`SourceAsset`]: a registry record, immutable once fetched.
//! - [`DestinationRecord`]: an active row of the destination store.
//! - [`LinkLocator`] / [`RoadLink`]: network resolution results.
//! - [`NewAssetRow`] / [`SupersedeRow`]: what the writer persists.

pub mod destination;
pub mod link;
pub mod row;
pub mod source;

pub use destination::{DestinationRecord, EXTERNAL_ID_SEPARATOR, join_external_ids};
pub use link::{LinkLocator, RoadLink, SideCode};
pub use row::{NewAssetRow, OutputValue, PropertyKind, PropertyValue, Provenance, SupersedeRow};
pub use source::{LocationQualifiers, RoadAddress, SourceAsset, SourceGeometry, parse_timestamp};
