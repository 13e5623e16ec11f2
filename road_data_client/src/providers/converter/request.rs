use serde::Serialize;

/// Return-value selector asking the converter for link ids and m-values plus
/// the municipality code.
pub const RETURN_LINK_LOCATION: &str = "4,6";

/// Only state-owned roads are of interest to the sync.
pub const STATE_ADMIN_CLASS: &str = "1";

/// One conversion item.
///
/// Exactly one of the addressing forms is meaningful per request: a road
/// address (`road`, `part`, `distance`, optionally an end address), a
/// coordinate pair, or a link range (`link_id`, `end_link_id`, `measure`,
/// `end_measure`). The converter echoes `token` back on every feature derived
/// from the request, which is how responses are correlated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionRequest {
    #[serde(rename = "tunniste")]
    pub token: String,

    #[serde(rename = "tie", skip_serializing_if = "Option::is_none")]
    pub road: Option<i64>,
    #[serde(rename = "osa", skip_serializing_if = "Option::is_none")]
    pub part: Option<i64>,
    #[serde(rename = "etaisyys", skip_serializing_if = "Option::is_none")]
    pub distance: Option<i64>,
    #[serde(rename = "osa_loppu", skip_serializing_if = "Option::is_none")]
    pub end_part: Option<i64>,
    #[serde(rename = "etaisyys_loppu", skip_serializing_if = "Option::is_none")]
    pub end_distance: Option<i64>,
    /// Comma-separated roadway numbers.
    #[serde(rename = "ajr", skip_serializing_if = "Option::is_none")]
    pub roadways: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    #[serde(rename = "link_id_loppu", skip_serializing_if = "Option::is_none")]
    pub end_link_id: Option<String>,
    #[serde(rename = "m_arvo", skip_serializing_if = "Option::is_none")]
    pub measure: Option<f64>,
    #[serde(rename = "m_arvo_loppu", skip_serializing_if = "Option::is_none")]
    pub end_measure: Option<f64>,

    #[serde(rename = "palautusarvot", skip_serializing_if = "Option::is_none")]
    pub return_values: Option<String>,
    /// Ask for every link between start and end instead of the two endpoints.
    #[serde(rename = "valihaku", skip_serializing_if = "Option::is_none")]
    pub interval_search: Option<bool>,
    #[serde(rename = "hallinnollinen_luokka", skip_serializing_if = "Option::is_none")]
    pub admin_class: Option<String>,
}

impl ConversionRequest {
    /// Empty request carrying only the correlation token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Point address on a state road.
    pub fn road_address(
        token: impl Into<String>,
        road: i64,
        part: i64,
        distance: i64,
        roadways: Option<String>,
    ) -> Self {
        Self {
            road: Some(road),
            part: Some(part),
            distance: Some(distance),
            roadways,
            return_values: Some(RETURN_LINK_LOCATION.into()),
            admin_class: Some(STATE_ADMIN_CLASS.into()),
            ..Self::new(token)
        }
    }

    /// Start and end address of a linear feature, endpoints only.
    pub fn road_range(
        token: impl Into<String>,
        start: (i64, i64, i64),
        end: (i64, i64),
        roadways: Option<String>,
    ) -> Self {
        Self {
            end_part: Some(end.0),
            end_distance: Some(end.1),
            ..Self::road_address(token, start.0, start.1, start.2, roadways)
        }
    }

    /// Plain coordinate lookup.
    pub fn coordinate(token: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            return_values: Some(RETURN_LINK_LOCATION.into()),
            ..Self::new(token)
        }
    }

    /// Enumerates every link traversed between two link positions.
    pub fn link_interval(
        token: impl Into<String>,
        start: (&str, f64),
        end: (&str, f64),
    ) -> Self {
        Self {
            link_id: Some(start.0.to_owned()),
            measure: Some(start.1),
            end_link_id: Some(end.0.to_owned()),
            end_measure: Some(end.1),
            return_values: Some(RETURN_LINK_LOCATION.into()),
            interval_search: Some(true),
            ..Self::new(token)
        }
    }

    /// Position on a link, used to look up the road address at that point.
    pub fn link_position(token: impl Into<String>, link_id: &str, measure: f64) -> Self {
        Self {
            link_id: Some(link_id.to_owned()),
            measure: Some(measure),
            ..Self::new(token)
        }
    }
}
