use serde::{Deserialize, Serialize};

use crate::geometry::Polyline;

/// Direction of an attribute relative to the link's digitizing direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideCode {
    /// Valid in both directions.
    BothDirections,
    /// Same direction as the link was digitized.
    TowardsDigitizing,
    /// Opposite to the digitizing direction.
    AgainstDigitizing,
    /// Direction could not be determined.
    #[default]
    Unknown,
}

impl SideCode {
    /// Stored integer value.
    pub fn code(self) -> i32 {
        match self {
            SideCode::BothDirections => 1,
            SideCode::TowardsDigitizing => 2,
            SideCode::AgainstDigitizing => 3,
            SideCode::Unknown => 99,
        }
    }

    /// Inverse of [`SideCode::code`]; anything unrecognized is `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => SideCode::BothDirections,
            2 => SideCode::TowardsDigitizing,
            3 => SideCode::AgainstDigitizing,
            _ => SideCode::Unknown,
        }
    }

    /// Side code of a network link. The maintained traffic direction wins
    /// over the direction type recorded with the link geometry.
    pub fn from_link_direction(traffic_direction: Option<i32>, direction_type: Option<i32>) -> Self {
        match (traffic_direction, direction_type) {
            (Some(2), _) => SideCode::BothDirections,
            (Some(3), _) => SideCode::AgainstDigitizing,
            (Some(4), _) => SideCode::TowardsDigitizing,
            (_, Some(0)) => SideCode::BothDirections,
            (_, Some(1)) => SideCode::TowardsDigitizing,
            (_, Some(2)) => SideCode::AgainstDigitizing,
            _ => SideCode::Unknown,
        }
    }
}

/// Result of resolving a road address to the network.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkLocator {
    /// Network link id.
    pub link_id: String,
    /// Measure of a point, or start measure of a range.
    pub start: f64,
    /// End measure of a range; `None` for points.
    pub end: Option<f64>,
    /// Municipality reported by the converter.
    pub municipality_code: Option<i32>,
    /// Set from the link's traffic direction by the link filter.
    pub side_code: SideCode,
}

/// A public road link from the authoritative network table.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadLink {
    /// Link id.
    pub link_id: String,
    /// Traffic direction of the link.
    pub side_code: SideCode,
    /// Geometric length in metres.
    pub length: f64,
    /// Municipality the link belongs to.
    pub municipality_code: Option<i32>,
    /// Digitized shape; may be empty when the store has no geometry.
    pub geometry: Polyline,
}
