use serde::Deserialize;
use serde_json::Value;

/// One converted location as the engine consumes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedLocation {
    pub token: String,
    pub link_id: String,
    pub end_link_id: Option<String>,
    pub measure: f64,
    pub end_measure: Option<f64>,
    pub municipality_code: Option<i32>,
    pub road: Option<i64>,
    pub part: Option<i64>,
    pub distance: Option<i64>,
}

/// A converter feature reduced to what the engine cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionFeature {
    Located(ConvertedLocation),
    /// The converter could not locate the item. `token` is absent when the
    /// error is not tied to a specific request.
    Failed {
        token: Option<String>,
        message: String,
    },
}

impl ConversionFeature {
    pub fn token(&self) -> Option<&str> {
        match self {
            ConversionFeature::Located(l) => Some(&l.token),
            ConversionFeature::Failed { token, .. } => token.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFeature {
    pub properties: RawProperties,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawProperties {
    Failed {
        virheet: Value,
        #[serde(default)]
        tunniste: Option<Value>,
    },
    Located {
        tunniste: Value,
        link_id: Value,
        m_arvo: f64,
        #[serde(default)]
        link_id_loppu: Option<Value>,
        #[serde(default)]
        m_arvo_loppu: Option<f64>,
        #[serde(default)]
        kuntakoodi: Option<i32>,
        #[serde(default)]
        tie: Option<i64>,
        #[serde(default)]
        osa: Option<i64>,
        #[serde(default)]
        etaisyys: Option<i64>,
    },
    Unrecognized(Value),
}

// Tokens and link ids come back as either strings or numbers.
fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FeatureCollection {
    /// Flattens the collection. Features that are neither a location nor an
    /// error are dropped.
    pub(crate) fn into_features(self) -> Vec<ConversionFeature> {
        self.features
            .into_iter()
            .filter_map(|f| match f.properties {
                RawProperties::Failed { virheet, tunniste } => Some(ConversionFeature::Failed {
                    token: tunniste.as_ref().map(text),
                    message: text(&virheet),
                }),
                RawProperties::Located {
                    tunniste,
                    link_id,
                    m_arvo,
                    link_id_loppu,
                    m_arvo_loppu,
                    kuntakoodi,
                    tie,
                    osa,
                    etaisyys,
                } => Some(ConversionFeature::Located(ConvertedLocation {
                    token: text(&tunniste),
                    link_id: text(&link_id),
                    end_link_id: link_id_loppu.as_ref().map(text),
                    measure: m_arvo,
                    end_measure: m_arvo_loppu,
                    municipality_code: kuntakoodi,
                    road: tie,
                    part: osa,
                    distance: etaisyys,
                })),
                RawProperties::Unrecognized(_) => None,
            })
            .collect()
    }
}
