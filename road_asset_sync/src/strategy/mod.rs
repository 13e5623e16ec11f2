//! Per-asset-type behaviour.
//!
//! The engine is the same for every asset type; a [`Strategy`] supplies the
//! parts that differ: which records are worth syncing, how a record is
//! resolved to the network, what value it persists, and its side code.
//! The strategy is chosen once per partition with [`Strategy::select`].

mod linear;
mod paved_surface;
mod point;
mod traffic_sign;
pub mod traffic_sign_mappings;

use std::collections::HashMap;

use road_data_client::providers::converter::ConversionRequest;
use tracing::info;

use crate::{
    geometry::GrowthDirection,
    model::{LinkLocator, NewAssetRow, OutputValue, RoadLink, SideCode, SourceAsset},
    partition::AssetKind,
    resolver::ResolverRequest,
};

pub use linear::LinearStrategy;
pub use paved_surface::{PAVEMENT_CLASS_PROPERTY, PavedSurfaceStrategy, PavementClass};
pub use point::PointStrategy;
pub use traffic_sign::TrafficSignStrategy;
pub use traffic_sign_mappings::SignTypeTable;

/// Asset type id of paved surfaces.
pub const PAVED_SURFACE_TYPE_ID: i32 = 110;
/// Asset type id of traffic signs.
pub const TRAFFIC_SIGN_TYPE_ID: i32 = 300;

/// State owned by one partition run.
///
/// Populated while fetching (source paths) and after link filtering (growth
/// directions); read by the strategies; dropped with the run.
#[derive(Debug, Default, Clone)]
pub struct RunState {
    /// Source path each record was fetched from, with the class prefix
    /// stripped for sub-path keyed strategies.
    pub source_path_by_oid: HashMap<String, String>,
    /// Road-address growth direction per link id.
    pub growth_by_link: HashMap<String, GrowthDirection>,
}

/// A resolved (and for linear assets, merged) position ready to be turned
/// into a destination row.
#[derive(Debug, Clone)]
pub struct Placement<'a> {
    /// Contributing external ids in position order.
    pub external_ids: Vec<String>,
    /// First contributing record.
    pub source: &'a SourceAsset,
    /// Position on the network.
    pub locator: LinkLocator,
    /// Final side code.
    pub side_code: SideCode,
    /// Derived output value.
    pub value: OutputValue,
}

impl Placement<'_> {
    /// The row every asset type shares: position, side code and properties.
    pub fn into_row(self) -> NewAssetRow {
        NewAssetRow {
            external_id: crate::model::join_external_ids(&self.external_ids),
            municipality_code: self.locator.municipality_code,
            link_id: self.locator.link_id,
            start_measure: self.locator.start,
            end_measure: self.locator.end,
            side_code: self.side_code.code(),
            geometry_wkt: None,
            bearing: None,
            properties: self.value.properties().to_vec(),
        }
    }
}

/// Operations that vary by asset type.
pub trait AssetTypeStrategy: Send + Sync {
    /// Keeps only the records worth synchronizing.
    fn filter_unnecessary(&self, records: Vec<SourceAsset>, state: &RunState) -> Vec<SourceAsset>;

    /// Converter request for `asset`, or `None` when it has no usable location.
    fn build_resolver_request(&self, asset: &SourceAsset, token: &str) -> Option<ResolverRequest>;

    /// Value persisted for `asset` and compared when merging. `None` drops
    /// the asset.
    fn derive_output_value(&self, asset: &SourceAsset, state: &RunState) -> Option<OutputValue>;

    /// Side code of `asset` at `locator`. Defaults to the link's direction.
    fn side_code(
        &self,
        _asset: &SourceAsset,
        locator: &LinkLocator,
        _link: &RoadLink,
        _state: &RunState,
    ) -> SideCode {
        locator.side_code
    }

    /// Destination row for one placement.
    fn to_destination_rows(&self, placement: Placement<'_>) -> NewAssetRow {
        placement.into_row()
    }

    /// Whether an updated record may be superseded.
    fn accepts_update(&self, _asset: &SourceAsset, _state: &RunState) -> bool {
        true
    }

    /// Whether [`AssetTypeStrategy::side_code`] reads link growth directions.
    fn needs_growth_direction(&self) -> bool {
        false
    }

    /// Whether contiguous equal segments are merged before persisting.
    fn merges_segments(&self) -> bool {
        false
    }
}

/// The closed set of strategies.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Generic point asset.
    Point,
    /// Generic linear asset.
    Linear,
    /// Paved surface classes.
    PavedSurface,
    /// Traffic signs with attribute remapping.
    TrafficSign(TrafficSignStrategy),
}

impl Strategy {
    /// Picks the strategy for an asset type.
    pub fn select(asset_type_id: i32, kind: AssetKind, sign_types: SignTypeTable) -> Self {
        match (asset_type_id, kind) {
            (PAVED_SURFACE_TYPE_ID, _) => Strategy::PavedSurface,
            (TRAFFIC_SIGN_TYPE_ID, _) => Strategy::TrafficSign(TrafficSignStrategy::new(sign_types)),
            (_, AssetKind::Point) => Strategy::Point,
            (_, AssetKind::Linear) => Strategy::Linear,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Point => "point",
            Strategy::Linear => "linear",
            Strategy::PavedSurface => "paved-surface",
            Strategy::TrafficSign(_) => "traffic-sign",
        }
    }

    fn inner(&self) -> &dyn AssetTypeStrategy {
        match self {
            Strategy::Point => &PointStrategy,
            Strategy::Linear => &LinearStrategy,
            Strategy::PavedSurface => &PavedSurfaceStrategy,
            Strategy::TrafficSign(s) => s,
        }
    }
}

impl AssetTypeStrategy for Strategy {
    fn filter_unnecessary(&self, records: Vec<SourceAsset>, state: &RunState) -> Vec<SourceAsset> {
        self.inner().filter_unnecessary(records, state)
    }

    fn build_resolver_request(&self, asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
        self.inner().build_resolver_request(asset, token)
    }

    fn derive_output_value(&self, asset: &SourceAsset, state: &RunState) -> Option<OutputValue> {
        self.inner().derive_output_value(asset, state)
    }

    fn side_code(
        &self,
        asset: &SourceAsset,
        locator: &LinkLocator,
        link: &RoadLink,
        state: &RunState,
    ) -> SideCode {
        self.inner().side_code(asset, locator, link, state)
    }

    fn to_destination_rows(&self, placement: Placement<'_>) -> NewAssetRow {
        self.inner().to_destination_rows(placement)
    }

    fn accepts_update(&self, asset: &SourceAsset, state: &RunState) -> bool {
        self.inner().accepts_update(asset, state)
    }

    fn needs_growth_direction(&self) -> bool {
        self.inner().needs_growth_direction()
    }

    fn merges_segments(&self) -> bool {
        self.inner().merges_segments()
    }
}

/// Drops records whose lifecycle status is set and not "in use".
pub(crate) fn with_valid_status(records: Vec<SourceAsset>) -> Vec<SourceAsset> {
    let before = records.len();
    let kept: Vec<_> = records.into_iter().filter(SourceAsset::has_valid_status).collect();
    if kept.len() != before {
        info!(dropped = before - kept.len(), "records with an invalid status dropped");
    }
    kept
}

/// Point lookup by road address, falling back to coordinates.
pub(crate) fn point_request(asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
    let request = match (asset.location, asset.point_coordinates()) {
        (Some(a), _) => ConversionRequest::road_address(
            token,
            a.road,
            a.part,
            a.distance,
            asset.roadway_numbers(),
        ),
        (None, Some((x, y))) => {
            ConversionRequest::coordinate(token, x, y)
        }
        (None, None) => return None,
    };
    Some(ResolverRequest::Point(request))
}

/// Endpoint lookup of a start/end address pair on one road.
pub(crate) fn range_request(asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
    let (start, end) = (asset.start_location?, asset.end_location?);
    if start.road != end.road {
        return None;
    }
    Some(ResolverRequest::Range(
        ConversionRequest::road_range(
            token,
            (start.road, start.part, start.distance),
            (end.part, end.distance),
            asset.roadway_numbers(),
        ),
    ))
}
