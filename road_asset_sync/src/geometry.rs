//! Polyline interpolation, bearings and side-code derivation.
//!
//! Bearings are compass degrees in `[0, 360)`: 0 is north (+y), 90 is east
//! (+x). Side codes are expressed relative to the link's digitizing direction.

use crate::model::SideCode;

/// Half-window around a measure used to sample a bearing.
pub const BEARING_WINDOW: f64 = 5.0;

/// Maximum angular difference still counted as the same direction.
pub const BEARING_TOLERANCE_DEG: f64 = 25.0;

const EPSILON: f64 = 1e-9;

/// Planar point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

impl Point {
    /// New point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    fn lerp(self, other: Point, ratio: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * ratio,
            self.y + (other.y - self.y) * ratio,
        )
    }
}

/// A link shape in digitizing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline(pub Vec<Point>);

impl Polyline {
    /// Builds a polyline from `[x, y, ..]` coordinate arrays; extra
    /// dimensions are ignored and short arrays skipped.
    pub fn from_coordinates(coords: &[Vec<f64>]) -> Self {
        Polyline(
            coords
                .iter()
                .filter(|c| c.len() >= 2)
                .map(|c| Point::new(c[0], c[1]))
                .collect(),
        )
    }

    /// Total arc length.
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Point at arc length `measure` from the first vertex.
    ///
    /// Walks the segments accumulating length until the target falls inside
    /// one, then interpolates linearly. Zero-length segments are skipped.
    /// Returns `None` when the measure lies beyond the end of the line.
    pub fn point_at(&self, measure: f64) -> Option<Point> {
        let mut remaining = measure.max(0.0);
        for w in self.0.windows(2) {
            let len = w[0].distance(w[1]);
            if len <= EPSILON {
                continue;
            }
            if remaining <= len + EPSILON {
                return Some(w[0].lerp(w[1], (remaining / len).min(1.0)));
            }
            remaining -= len;
        }
        None
    }

    /// Bearing of the line around `measure`.
    ///
    /// Samples the line at `measure - 5` and `measure + 5`, clamped to the
    /// line, and returns the compass direction from the first sample to the
    /// second. `None` when the line has fewer than two distinct vertices.
    pub fn bearing(&self, measure: f64) -> Option<f64> {
        if self.0.len() < 2 {
            return None;
        }
        let length = self.length();
        if length <= EPSILON {
            return None;
        }
        let start_m = (measure - BEARING_WINDOW).max(0.0);
        let end_m = (measure + BEARING_WINDOW).min(length);
        let start = self.point_at(start_m).unwrap_or(self.0[0]);
        let end = self.point_at(end_m).unwrap_or(self.0[self.0.len() - 1]);
        compass_bearing(start, end)
    }
}

/// Compass direction from `from` to `to`.
pub fn compass_bearing(from: Point, to: Point) -> Option<f64> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() <= EPSILON && dy.abs() <= EPSILON {
        return None;
    }
    Some(dx.atan2(dy).to_degrees().rem_euclid(360.0))
}

/// Smallest angle between two bearings, in `[0, 180]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Side code of an asset facing `asset_bearing` on a link running at
/// `link_bearing` at the asset's position.
pub fn side_code_from_bearing(asset_bearing: f64, link_bearing: f64) -> SideCode {
    let reverse = (link_bearing + 180.0).rem_euclid(360.0);
    if angular_difference(asset_bearing, link_bearing) <= BEARING_TOLERANCE_DEG {
        SideCode::TowardsDigitizing
    } else if angular_difference(asset_bearing, reverse) <= BEARING_TOLERANCE_DEG {
        SideCode::AgainstDigitizing
    } else {
        SideCode::Unknown
    }
}

/// Side of the road relative to road-address growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadSide {
    /// `puoli/p01`.
    Right,
    /// `puoli/p02`.
    Left,
}

/// Declared validity direction relative to the lane's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityDirection {
    /// Faces traffic travelling in the lane's direction.
    WithTraffic,
    /// Faces traffic travelling against the lane's direction.
    AgainstTraffic,
}

/// Direction relative to road-address growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthDirection {
    /// Same way the road address grows.
    Towards,
    /// Opposite to road-address growth.
    Against,
}

/// Growth-relative validity of a declared side and direction.
pub fn validity_relative_to_growth(side: RoadSide, direction: ValidityDirection) -> GrowthDirection {
    use GrowthDirection::*;
    match (side, direction) {
        (RoadSide::Right, ValidityDirection::WithTraffic) => Towards,
        (RoadSide::Right, ValidityDirection::AgainstTraffic) => Against,
        (RoadSide::Left, ValidityDirection::WithTraffic) => Against,
        (RoadSide::Left, ValidityDirection::AgainstTraffic) => Towards,
    }
}

/// Side code from a declared road side and validity direction.
///
/// `link_growth` is the road-address growth direction along the link's
/// digitizing direction; when it is unknown the side code is unknown too.
pub fn side_code_from_declared_direction(
    side: RoadSide,
    direction: ValidityDirection,
    link_growth: Option<GrowthDirection>,
) -> SideCode {
    let Some(link_growth) = link_growth else {
        return SideCode::Unknown;
    };
    match (validity_relative_to_growth(side, direction), link_growth) {
        (GrowthDirection::Towards, GrowthDirection::Towards)
        | (GrowthDirection::Against, GrowthDirection::Against) => SideCode::TowardsDigitizing,
        _ => SideCode::AgainstDigitizing,
    }
}
