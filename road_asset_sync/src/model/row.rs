use chrono::NaiveDateTime;
use serde::Serialize;

/// Typed value of one destination property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyKind {
    /// Enumerated value, looked up by its numeric value.
    SingleChoice(i32),
    /// Numeric value.
    Number(f64),
    /// Free text.
    Text(String),
}

/// One property of a destination record, addressed by its public id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyValue {
    /// Public id in the property catalog.
    pub public_id: String,
    /// Value to store.
    pub value: PropertyKind,
}

impl PropertyValue {
    /// Single-choice value.
    pub fn single_choice(public_id: &str, value: i32) -> Self {
        Self {
            public_id: public_id.to_owned(),
            value: PropertyKind::SingleChoice(value),
        }
    }

    /// Numeric value.
    pub fn number(public_id: &str, value: f64) -> Self {
        Self {
            public_id: public_id.to_owned(),
            value: PropertyKind::Number(value),
        }
    }

    /// Text value.
    pub fn text(public_id: &str, value: impl Into<String>) -> Self {
        Self {
            public_id: public_id.to_owned(),
            value: PropertyKind::Text(value.into()),
        }
    }
}

/// Derived output attribute of a source record, compared structurally when
/// merging segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OutputValue {
    /// No domain attributes; the record only equals itself.
    ExternalId(String),
    /// Property values to persist.
    Properties(Vec<PropertyValue>),
}

impl OutputValue {
    /// Property rows carried by the value.
    pub fn properties(&self) -> &[PropertyValue] {
        match self {
            OutputValue::ExternalId(_) => &[],
            OutputValue::Properties(p) => p,
        }
    }
}

/// Everything needed to create one destination record with its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAssetRow {
    /// External id, joined when several records were merged.
    pub external_id: String,
    /// Municipality of the position.
    pub municipality_code: Option<i32>,
    /// Link id.
    pub link_id: String,
    /// Start measure, or the measure of a point.
    pub start_measure: f64,
    /// End measure of a linear record.
    pub end_measure: Option<f64>,
    /// Stored side code value.
    pub side_code: i32,
    /// Point geometry as WKT, written with the network's SRID.
    pub geometry_wkt: Option<String>,
    /// Compass bearing of a point asset.
    pub bearing: Option<i32>,
    /// Additional property rows.
    pub properties: Vec<PropertyValue>,
}

/// Original creator identity carried over when a record is superseded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    /// Creator of the first version.
    pub created_by: Option<String>,
    /// Creation time of the first version.
    pub created_date: Option<NaiveDateTime>,
}

/// A new version of one or more active records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupersedeRow {
    /// Internal ids of the active records being replaced.
    pub replaces: Vec<i64>,
    /// Provenance known from the destination read, used when the expired
    /// rows no longer report one.
    pub provenance: Provenance,
    /// The replacement.
    pub row: NewAssetRow,
}
