use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;

/// Lifecycle status code of a built, in-use road object.
pub const STATUS_IN_USE: &str = "tiekohteen-tila/tt03";

/// Road address triple as the registry publishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoadAddress {
    /// Road number.
    #[serde(rename = "tie")]
    pub road: i64,
    /// Road part number.
    #[serde(rename = "osa")]
    pub part: i64,
    /// Distance from the start of the part, in metres.
    #[serde(rename = "etaisyys")]
    pub distance: i64,
}

/// Centre-line geometry of a source record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SourceGeometry {
    /// `[x, y, z]` in ETRS-TM35FIN.
    Point {
        /// Coordinate triple; z may be absent.
        coordinates: Vec<f64>,
    },
    /// One or more polylines.
    #[serde(alias = "MultiLinestring")]
    MultiLineString {
        /// Lines of `[x, y, z]` vertices.
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    /// Any other geometry type; not used by the engine.
    #[serde(other)]
    Other,
}

/// Lane and carriageway qualifiers of a record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationQualifiers {
    /// Roadway codes such as `ajorata/ajr1`.
    #[serde(default, rename = "ajoradat")]
    pub roadways: Option<Vec<String>>,
    /// Lane codes such as `kaista-numerointi/kanu11`.
    #[serde(default, rename = "kaistat")]
    pub lanes: Option<Vec<String>>,
    /// Road side code such as `puoli/p01`.
    #[serde(default, rename = "puoli")]
    pub side: Option<String>,
}

/// A record fetched from the source registry.
///
/// Records are immutable for the duration of a run; asset-type specific
/// attributes stay in the raw `attributes` bag and are read by the strategies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceAsset {
    /// Stable external id.
    pub oid: String,
    /// Creation timestamp as published.
    #[serde(default, rename = "luotu")]
    pub created_at: Option<String>,
    /// Modification timestamp as published.
    #[serde(default, rename = "muokattu")]
    pub modified_at: Option<String>,
    /// Lifecycle status code.
    #[serde(default, rename = "tiekohteen-tila")]
    pub status: Option<String>,
    /// Road address of a point record.
    #[serde(default, rename = "sijainti")]
    pub location: Option<RoadAddress>,
    /// Start address of a linear record.
    #[serde(default, rename = "alkusijainti")]
    pub start_location: Option<RoadAddress>,
    /// End address of a linear record.
    #[serde(default, rename = "loppusijainti")]
    pub end_location: Option<RoadAddress>,
    /// Centre-line geometry.
    #[serde(default, rename = "keskilinjageometria")]
    pub geometry: Option<SourceGeometry>,
    /// Lane and carriageway qualifiers.
    #[serde(default, rename = "sijaintitarkenne")]
    pub qualifiers: LocationQualifiers,
    /// Asset-type specific attributes.
    #[serde(default, rename = "ominaisuudet")]
    pub attributes: Value,
}

impl SourceAsset {
    /// Deserializes one raw registry record.
    pub fn from_value(value: Value) -> Result<Self, SyncError> {
        let oid = value
            .get("oid")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_owned();
        serde_json::from_value(value).map_err(|e| SyncError::malformed(oid, e.to_string()))
    }

    /// True when the status is absent or "in use".
    pub fn has_valid_status(&self) -> bool {
        match self.status.as_deref() {
            None => true,
            Some(s) => s == STATUS_IN_USE,
        }
    }

    /// Roadway numbers extracted from the qualifiers, comma separated.
    pub fn roadway_numbers(&self) -> Option<String> {
        let numbers: Vec<String> = self
            .qualifiers
            .roadways
            .iter()
            .flatten()
            .filter_map(|code| {
                let digits: String = code
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(char::is_ascii_digit)
                    .collect();
                (!digits.is_empty()).then_some(digits)
            })
            .collect();
        (!numbers.is_empty()).then(|| numbers.join(","))
    }

    /// Planar coordinates of a point geometry.
    pub fn point_coordinates(&self) -> Option<(f64, f64)> {
        match &self.geometry {
            Some(SourceGeometry::Point { coordinates }) if coordinates.len() >= 2 => {
                Some((coordinates[0], coordinates[1]))
            }
            _ => None,
        }
    }

    /// Walks the attribute bag.
    pub fn attribute(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.attributes, |v, key| v.get(key))
            .filter(|v| !v.is_null())
    }

    /// String attribute at `path`.
    pub fn attribute_str(&self, path: &[&str]) -> Option<&str> {
        self.attribute(path).and_then(Value::as_str)
    }

    /// Modification time, falling back to creation time.
    pub fn last_changed(&self) -> Result<NaiveDateTime, SyncError> {
        let raw = self
            .modified_at
            .as_deref()
            .or(self.created_at.as_deref())
            .ok_or_else(|| SyncError::malformed(&self.oid, "record has no timestamps"))?;
        parse_timestamp(&self.oid, raw)
    }
}

/// Parses the timestamp formats the registry emits: RFC 3339, a naive
/// datetime, or a bare date (taken as midnight). Offsets are normalized to UTC.
pub fn parse_timestamp(oid: &str, raw: &str) -> Result<NaiveDateTime, SyncError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| SyncError::Timestamp {
            oid: oid.to_owned(),
            value: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_point_record() {
        let a = SourceAsset::from_value(json!({
            "oid": "1.2.246.578.4.3.1",
            "luotu": "2023-01-10T08:00:00Z",
            "muokattu": null,
            "tiekohteen-tila": null,
            "sijainti": {"tie": 4, "osa": 101, "etaisyys": 250},
            "keskilinjageometria": {"type": "Point", "coordinates": [385000.5, 6672000.25, 12.0]},
            "sijaintitarkenne": {"ajoradat": ["ajorata/ajr1", "ajorata/ajr2"]},
            "ominaisuudet": {"rakenteelliset-ominaisuudet": {"suunta": 90}}
        }))
        .unwrap();
        assert!(a.has_valid_status());
        assert_eq!(a.roadway_numbers().as_deref(), Some("1,2"));
        assert_eq!(a.point_coordinates(), Some((385000.5, 6672000.25)));
        assert_eq!(
            a.attribute(&["rakenteelliset-ominaisuudet", "suunta"]),
            Some(&json!(90))
        );
        assert_eq!(
            a.last_changed().unwrap().to_string(),
            "2023-01-10 08:00:00"
        );
    }

    #[test]
    fn linear_geometry_accepts_both_spellings() {
        let g: SourceGeometry = serde_json::from_value(json!({
            "type": "MultiLinestring",
            "coordinates": [[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]]
        }))
        .unwrap();
        assert!(matches!(g, SourceGeometry::MultiLineString { .. }));
    }

    #[test]
    fn null_qualifier_lists_are_tolerated() {
        let a = SourceAsset::from_value(json!({
            "oid": "x",
            "sijaintitarkenne": {"ajoradat": null, "kaistat": null}
        }))
        .unwrap();
        assert_eq!(a.roadway_numbers(), None);
    }

    #[test]
    fn missing_oid_is_a_data_error() {
        let err = SourceAsset::from_value(json!({"luotu": "2023-01-01"})).unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord { ref oid, .. } if oid == "<unknown>"));
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(
            parse_timestamp("a", "2023-02-01T10:00:00+02:00").unwrap().to_string(),
            "2023-02-01 08:00:00"
        );
        assert_eq!(
            parse_timestamp("a", "2023-02-01T10:00:00.123").unwrap().to_string(),
            "2023-02-01 10:00:00.123"
        );
        assert_eq!(
            parse_timestamp("a", "2023-02-01").unwrap().to_string(),
            "2023-02-01 00:00:00"
        );
        assert!(matches!(
            parse_timestamp("a", "yesterday"),
            Err(SyncError::Timestamp { .. })
        ));
    }
}
