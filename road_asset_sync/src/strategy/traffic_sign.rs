//! Traffic signs: eligibility rules, attribute remapping and the
//! declared-direction side code.

use serde_json::Value;
use tracing::info;

use crate::{
    geometry::{RoadSide, ValidityDirection, side_code_from_declared_direction},
    model::{LinkLocator, NewAssetRow, OutputValue, PropertyValue, RoadLink, SideCode, SourceAsset},
    resolver::ResolverRequest,
};

use super::{
    AssetTypeStrategy, Placement, RunState,
    point::{declared_bearing, geometric_side_code, point_row},
    point_request,
    traffic_sign_mappings::{self as mapping, SignTypeTable},
    with_valid_status,
};

const CONDITION: &str = "kunto-ja-vauriotiedot";
const STRUCTURAL: &str = "rakenteelliset-ominaisuudet";
const FUNCTIONAL: &str = "toiminnalliset-ominaisuudet";

const LOCATION_DEVIATIONS: [&str; 2] = ["sijaintipoikkeus/sp01", "sijaintipoikkeus/sp02"];
const WITH_TRAFFIC: &str = "liikennemerkki-vaikutussuunta/liivasu01";
const AGAINST_TRAFFIC: &str = "liikennemerkki-vaikutussuunta/liivasu02";
const LENGTHWISE: &str = "liikennemerkki-vaikutussuunta/liivasu03";
const SIDE_RIGHT: &str = "puoli/p01";
const SIDE_LEFT: &str = "puoli/p02";
const SIDE_BETWEEN: &str = "puoli/p03";

/// Traffic sign strategy; owns the sign type table of the run.
#[derive(Debug, Clone, Default)]
pub struct TrafficSignStrategy {
    sign_types: SignTypeTable,
}

impl TrafficSignStrategy {
    /// Strategy using `sign_types` for the sign type lookup.
    pub fn new(sign_types: SignTypeTable) -> Self {
        Self { sign_types }
    }

    fn sign_type(&self, asset: &SourceAsset) -> Option<i32> {
        self.sign_types.lookup(
            asset.attribute_str(&[FUNCTIONAL, "lakinumero"]),
            asset.attribute_str(&[FUNCTIONAL, "asetusnumero"]),
        )
    }

    fn is_eligible(asset: &SourceAsset) -> bool {
        let deviation = asset.attribute_str(&["sijaintipoikkeus"]);
        if deviation.is_some_and(|d| LOCATION_DEVIATIONS.contains(&d)) {
            return false;
        }
        if asset.attribute_str(&[FUNCTIONAL, "vaikutussuunta"]) == Some(LENGTHWISE) {
            return false;
        }
        match asset.qualifiers.side.as_deref() {
            Some(SIDE_RIGHT | SIDE_LEFT) => true,
            Some(SIDE_BETWEEN) => declared_bearing(asset).is_some(),
            _ => false,
        }
    }
}

fn declared_side(asset: &SourceAsset) -> Option<RoadSide> {
    match asset.qualifiers.side.as_deref()? {
        SIDE_RIGHT => Some(RoadSide::Right),
        SIDE_LEFT => Some(RoadSide::Left),
        _ => None,
    }
}

fn declared_validity(asset: &SourceAsset) -> Option<ValidityDirection> {
    match asset.attribute_str(&[FUNCTIONAL, "vaikutussuunta"])? {
        WITH_TRAFFIC => Some(ValidityDirection::WithTraffic),
        AGAINST_TRAFFIC => Some(ValidityDirection::AgainstTraffic),
        _ => None,
    }
}

fn number(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().replace(',', ".").parse().ok()))
}

impl AssetTypeStrategy for TrafficSignStrategy {
    fn filter_unnecessary(&self, records: Vec<SourceAsset>, _state: &RunState) -> Vec<SourceAsset> {
        let valid = with_valid_status(records);
        let before = valid.len();
        let eligible: Vec<_> = valid.into_iter().filter(Self::is_eligible).collect();
        let placed = eligible.len();
        let kept: Vec<_> = eligible
            .into_iter()
            .filter(|a| self.sign_type(a).is_some())
            .collect();
        info!(
            ineligible = before - placed,
            unmapped_type = placed - kept.len(),
            kept = kept.len(),
            "traffic signs filtered"
        );
        kept
    }

    fn build_resolver_request(&self, asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
        point_request(asset, token)
    }

    fn derive_output_value(&self, asset: &SourceAsset, _state: &RunState) -> Option<OutputValue> {
        let mut props = vec![PropertyValue::single_choice(
            "trafficSigns_type",
            self.sign_type(asset)?,
        )];
        if let Some(v) = asset.attribute(&[STRUCTURAL, "arvo"]).and_then(number) {
            props.push(PropertyValue::number("trafficSigns_value", v));
        }
        if let Some(info) = asset.attribute_str(&[FUNCTIONAL, "lisatietoja"]) {
            props.push(PropertyValue::text("trafficSigns_info", info));
        }

        let first_damage = asset
            .attribute(&[CONDITION, "varustevauriot"])
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(Value::as_str);
        let choices = [
            ("location_specifier", mapping::location_specifier(asset.qualifiers.side.as_deref())),
            ("structure", mapping::structure(asset.attribute_str(&[STRUCTURAL, "kiinnitystapa"]))),
            ("condition", mapping::condition(asset.attribute_str(&[CONDITION, "yleinen-kuntoluokka"]))),
            ("size", mapping::size(asset.attribute_str(&[STRUCTURAL, "koko"]))),
            ("coating_type", mapping::coating_type(asset.attribute_str(&[STRUCTURAL, "kalvotyyppi"]))),
            ("sign_material", mapping::sign_material(asset.attribute_str(&[STRUCTURAL, "materiaali"]))),
            ("type_of_damage", mapping::type_of_damage(first_damage)),
            (
                "urgency_of_repair",
                mapping::urgency_of_repair(
                    asset.attribute_str(&[CONDITION, "korjauksen-kiireellisyysluokka"]),
                ),
            ),
        ];
        props.extend(
            choices
                .into_iter()
                .filter_map(|(id, v)| v.map(|v| PropertyValue::single_choice(id, v))),
        );
        Some(OutputValue::Properties(props))
    }

    /// Bearing-based when the sign declares a bearing and the link has a
    /// shape; otherwise from the declared side and validity direction.
    fn side_code(
        &self,
        asset: &SourceAsset,
        locator: &LinkLocator,
        link: &RoadLink,
        state: &RunState,
    ) -> SideCode {
        if let Some(by_bearing) = geometric_side_code(asset, locator, link) {
            return by_bearing;
        }
        match (declared_side(asset), declared_validity(asset)) {
            (Some(side), Some(validity)) => side_code_from_declared_direction(
                side,
                validity,
                state.growth_by_link.get(&link.link_id).copied(),
            ),
            _ => SideCode::Unknown,
        }
    }

    fn to_destination_rows(&self, placement: Placement<'_>) -> NewAssetRow {
        point_row(placement)
    }

    fn needs_growth_direction(&self) -> bool {
        true
    }
}
