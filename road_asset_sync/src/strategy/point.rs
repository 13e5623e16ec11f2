use crate::{
    geometry::side_code_from_bearing,
    model::{LinkLocator, NewAssetRow, OutputValue, RoadLink, SideCode, SourceAsset},
    resolver::ResolverRequest,
};

use super::{AssetTypeStrategy, Placement, RunState, point_request, with_valid_status};

/// Attribute path of a point asset's own compass bearing.
pub(crate) const BEARING_PATH: [&str; 2] = ["rakenteelliset-ominaisuudet", "suunta"];

/// Generic point asset: one locator per record, geometry and bearing stored
/// with the row.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointStrategy;

/// Compass bearing declared on the record, if any. Accepts numbers and
/// numeric strings.
pub(crate) fn declared_bearing(asset: &SourceAsset) -> Option<f64> {
    let v = asset.attribute(&BEARING_PATH)?;
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Side code from the record's bearing against the link bearing at the
/// locator's measure. `None` when either bearing is unavailable.
pub(crate) fn geometric_side_code(
    asset: &SourceAsset,
    locator: &LinkLocator,
    link: &RoadLink,
) -> Option<SideCode> {
    let asset_bearing = declared_bearing(asset)?;
    let link_bearing = link.geometry.bearing(locator.start)?;
    Some(side_code_from_bearing(asset_bearing, link_bearing))
}

/// [`geometric_side_code`], unknown when a bearing is missing.
pub(crate) fn bearing_side_code(asset: &SourceAsset, locator: &LinkLocator, link: &RoadLink) -> SideCode {
    geometric_side_code(asset, locator, link).unwrap_or(SideCode::Unknown)
}

/// Shared point row: position plus point geometry and bearing.
pub(crate) fn point_row(placement: Placement<'_>) -> NewAssetRow {
    let geometry_wkt = placement
        .source
        .point_coordinates()
        .map(|(x, y)| format!("POINT({x} {y} 0)"));
    let bearing = declared_bearing(placement.source).map(|b| b.round() as i32);
    NewAssetRow {
        geometry_wkt,
        bearing,
        ..placement.into_row()
    }
}

impl AssetTypeStrategy for PointStrategy {
    fn filter_unnecessary(&self, records: Vec<SourceAsset>, _state: &RunState) -> Vec<SourceAsset> {
        with_valid_status(records)
    }

    fn build_resolver_request(&self, asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
        point_request(asset, token)
    }

    fn derive_output_value(&self, asset: &SourceAsset, _state: &RunState) -> Option<OutputValue> {
        Some(OutputValue::ExternalId(asset.oid.clone()))
    }

    fn side_code(
        &self,
        asset: &SourceAsset,
        locator: &LinkLocator,
        link: &RoadLink,
        _state: &RunState,
    ) -> SideCode {
        bearing_side_code(asset, locator, link)
    }

    fn to_destination_rows(&self, placement: Placement<'_>) -> NewAssetRow {
        point_row(placement)
    }
}
