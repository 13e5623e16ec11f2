//! Paved surfaces: a material-based classification keyed by the source
//! sub-path, and main-lane deduplication.

use tracing::{info, warn};

use crate::{
    model::{OutputValue, PropertyValue, SourceAsset},
    resolver::ResolverRequest,
};

use super::{AssetTypeStrategy, RunState, range_request, with_valid_status};

/// Public id of the single-choice pavement class property.
pub const PAVEMENT_CLASS_PROPERTY: &str = "paallysteluokka";

/// Prefix shared by every pavement source path.
pub const SOURCE_PREFIX: &str = "paallyste-ja-pintarakenne/";

const KNOWN_SOURCES: [&str; 5] = [
    "ladottavat-pintarakenteet",
    "muut-pintarakenteet",
    "pintaukset",
    "sidotut-paallysrakenteet",
    "sitomattomat-pintarakenteet",
];
const VERSIONED_SOURCES: [&str; 2] = ["ladottavat-pintarakenteet", "muut-pintarakenteet"];

const ASPHALT: &[&str] = &[
    "muu-materiaali/mm04",
    "paallystetyyppi/pt01",
    "paallystetyyppi/pt02",
    "paallystetyyppi/pt03",
    "paallystetyyppi/pt04",
    "paallystetyyppi/pt08",
    "paallystetyyppi/pt09",
    "paallystetyyppi/pt10",
    "paallystetyyppi/pt11",
    "paallystetyyppi/pt12",
    "paallystetyyppi/pt13",
    "paallystetyyppi/pt14",
    "paallystetyyppi/pt15",
    "paallystetyyppi/pt16",
    "paallystetyyppi/pt17",
    "paallystetyyppi/pt18",
];
const COBBLESTONE: &[&str] = &[
    "kiven-materiaali/km01",
    "kiven-materiaali/km02",
    "kiven-materiaali/km03",
];
const UNBOUND: &[&str] = &[
    "muu-materiaali/mm03",
    "muu-materiaali/mm09",
    "sitomattoman-pintarakenteen-runkomateriaali/spr01",
    "sitomattoman-pintarakenteen-runkomateriaali/spr02",
    "sitomattoman-pintarakenteen-runkomateriaali/spr03",
];
const OTHER: &[&str] = &[
    "muu-materiaali/mm01",
    "muu-materiaali/mm02",
    "muu-materiaali/mm05",
    "muu-materiaali/mm06",
    "muu-materiaali/mm07",
    "pintauksen-tyyppi/pintaus01",
    "pintauksen-tyyppi/pintaus03",
    "pintauksen-uusiomateriaali/pu",
    "paallystetyyppi/pt07",
];
const UNKNOWN: &[&str] = &["muu-materiaali/mm08", "paallystetyyppi/pt21"];

const MAIN_LANES: [&str; 3] = [
    "kaista-numerointi/kanu11",
    "kaista-numerointi/kanu21",
    "kaista-numerointi/kanu31",
];
const ONE_SIDE_MAIN_LANES: [&str; 2] = ["kaista-numerointi/kanu11", "kaista-numerointi/kanu31"];
const UNDIVIDED_ROADWAY: &str = "ajorata/ajr0";

/// Destination pavement class; the discriminant is the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PavementClass {
    /// Asphalt.
    Asphalt = 1,
    /// Cobblestone.
    Cobblestone = 2,
    /// Unbound wear layer.
    UnboundWearLayer = 3,
    /// Other paved classes.
    Other = 4,
    /// Paved, type unknown.
    Unknown = 99,
}

impl PavementClass {
    /// Stored enumerated value.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Classifies a record fetched from `sub_path`.
    ///
    /// `None` means the record is not imported. An unrecognized sub-path is
    /// never classifiable.
    pub fn classify(sub_path: &str, asset: &SourceAsset) -> Option<Self> {
        fn in_list(list: &[&str], v: Option<&str>) -> bool {
            v.is_some_and(|v| list.contains(&v))
        }
        fn by_material(v: Option<&str>, lists: &[(&[&str], PavementClass)]) -> Option<PavementClass> {
            lists
                .iter()
                .find(|(list, _)| in_list(list, v))
                .map(|&(_, class)| class)
        }
        let attr = |key: &str| asset.attribute_str(&[key]);

        match sub_path {
            "ladottavat-pintarakenteet" => {
                by_material(attr("materiaali"), &[(COBBLESTONE, Self::Cobblestone)])
            }
            "muut-pintarakenteet" => by_material(
                attr("materiaali"),
                &[
                    (ASPHALT, Self::Asphalt),
                    (UNBOUND, Self::UnboundWearLayer),
                    (OTHER, Self::Other),
                    (UNKNOWN, Self::Unknown),
                ],
            ),
            "pintaukset" => (in_list(OTHER, attr("pintauksen-tyyppi"))
                || in_list(OTHER, attr("uusiomateriaali")))
            .then_some(Self::Other),
            "sidotut-paallysrakenteet" => {
                if attr("tyyppi") != Some("sidotun-paallysrakenteen-tyyppi/spt01") {
                    return None;
                }
                by_material(
                    attr("paallysteen-tyyppi"),
                    &[
                        (ASPHALT, Self::Asphalt),
                        (OTHER, Self::Other),
                        (UNKNOWN, Self::Unknown),
                    ],
                )
            }
            "sitomattomat-pintarakenteet" => by_material(
                attr("runkomateriaali"),
                &[(UNBOUND, Self::UnboundWearLayer)],
            ),
            _ => None,
        }
    }
}

/// Strips the pavement class prefix from a source path.
pub fn sub_path(source_path: &str) -> &str {
    source_path.strip_prefix(SOURCE_PREFIX).unwrap_or(source_path)
}

/// True when the record lies on a main lane, or has no lane qualifier. On an
/// undivided roadway only one direction's main lane is kept.
pub(crate) fn on_main_lane(asset: &SourceAsset) -> bool {
    let q = &asset.qualifiers;
    let lanes = q.lanes.as_deref().unwrap_or_default();
    if lanes.is_empty() {
        return true;
    }
    let undivided = matches!(q.roadways.as_deref(), Some([only]) if only == UNDIVIDED_ROADWAY);
    if undivided {
        lanes.iter().any(|l| ONE_SIDE_MAIN_LANES.contains(&l.as_str()))
    } else {
        lanes.iter().any(|l| MAIN_LANES.contains(&l.as_str()))
    }
}

/// Paved surface strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PavedSurfaceStrategy;

impl PavedSurfaceStrategy {
    fn class_of(asset: &SourceAsset, state: &RunState) -> Option<PavementClass> {
        let path = state.source_path_by_oid.get(&asset.oid)?;
        PavementClass::classify(sub_path(path), asset)
    }
}

impl AssetTypeStrategy for PavedSurfaceStrategy {
    fn filter_unnecessary(&self, records: Vec<SourceAsset>, state: &RunState) -> Vec<SourceAsset> {
        let valid = with_valid_status(records);
        let before = valid.len();
        let main: Vec<_> = valid.into_iter().filter(on_main_lane).collect();
        let on_main = main.len();

        let mut unknown_paths = 0usize;
        let kept: Vec<_> = main
            .into_iter()
            .filter(|a| {
                let known = state
                    .source_path_by_oid
                    .get(&a.oid)
                    .map(|p| sub_path(p))
                    .is_some_and(|p| KNOWN_SOURCES.contains(&p));
                if !known {
                    unknown_paths += 1;
                }
                Self::class_of(a, state).is_some()
            })
            .collect();

        if unknown_paths > 0 {
            warn!(count = unknown_paths, "pavement records from an unrecognized source path dropped");
        }
        info!(
            side_lanes = before - on_main,
            unclassified = on_main - kept.len(),
            kept = kept.len(),
            "pavement records filtered"
        );
        kept
    }

    fn build_resolver_request(&self, asset: &SourceAsset, token: &str) -> Option<ResolverRequest> {
        range_request(asset, token)
    }

    fn derive_output_value(&self, asset: &SourceAsset, state: &RunState) -> Option<OutputValue> {
        let class = Self::class_of(asset, state)?;
        Some(OutputValue::Properties(vec![PropertyValue::single_choice(
            PAVEMENT_CLASS_PROPERTY,
            class.value(),
        )]))
    }

    fn accepts_update(&self, asset: &SourceAsset, state: &RunState) -> bool {
        state
            .source_path_by_oid
            .get(&asset.oid)
            .is_some_and(|p| VERSIONED_SOURCES.contains(&sub_path(p)))
    }

    fn merges_segments(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pavement(oid: &str, attrs: serde_json::Value) -> SourceAsset {
        SourceAsset::from_value(json!({"oid": oid, "ominaisuudet": attrs})).unwrap()
    }

    fn laned(oid: &str, roadways: &[&str], lanes: &[&str]) -> SourceAsset {
        SourceAsset::from_value(json!({
            "oid": oid,
            "sijaintitarkenne": {"ajoradat": roadways, "kaistat": lanes},
            "ominaisuudet": {"materiaali": "paallystetyyppi/pt01"}
        }))
        .unwrap()
    }

    #[test]
    fn classification_by_sub_path() {
        use PavementClass::*;
        let cases = [
            ("ladottavat-pintarakenteet", json!({"materiaali": "kiven-materiaali/km02"}), Some(Cobblestone)),
            ("ladottavat-pintarakenteet", json!({"materiaali": "paallystetyyppi/pt01"}), None),
            ("muut-pintarakenteet", json!({"materiaali": "paallystetyyppi/pt10"}), Some(Asphalt)),
            ("muut-pintarakenteet", json!({"materiaali": "muu-materiaali/mm09"}), Some(UnboundWearLayer)),
            ("muut-pintarakenteet", json!({"materiaali": "paallystetyyppi/pt07"}), Some(Other)),
            ("muut-pintarakenteet", json!({"materiaali": "muu-materiaali/mm08"}), Some(Unknown)),
            ("pintaukset", json!({"pintauksen-tyyppi": "pintauksen-tyyppi/pintaus03"}), Some(Other)),
            ("pintaukset", json!({"uusiomateriaali": "pintauksen-uusiomateriaali/pu"}), Some(Other)),
            ("pintaukset", json!({"pintauksen-tyyppi": "pintauksen-tyyppi/pintaus02"}), None),
            (
                "sidotut-paallysrakenteet",
                json!({"tyyppi": "sidotun-paallysrakenteen-tyyppi/spt01", "paallysteen-tyyppi": "paallystetyyppi/pt21"}),
                Some(Unknown),
            ),
            (
                "sidotut-paallysrakenteet",
                json!({"tyyppi": "sidotun-paallysrakenteen-tyyppi/spt02", "paallysteen-tyyppi": "paallystetyyppi/pt01"}),
                None,
            ),
            (
                "sitomattomat-pintarakenteet",
                json!({"runkomateriaali": "sitomattoman-pintarakenteen-runkomateriaali/spr02"}),
                Some(UnboundWearLayer),
            ),
            ("tuntematon", json!({"materiaali": "paallystetyyppi/pt01"}), None),
        ];
        for (path, attrs, expected) in cases {
            assert_eq!(
                PavementClass::classify(path, &pavement("x", attrs.clone())),
                expected,
                "{path} {attrs}"
            );
        }
    }

    #[test]
    fn main_lane_rules() {
        assert!(on_main_lane(&laned("a", &["ajorata/ajr0"], &[])));
        assert!(on_main_lane(&laned("b", &["ajorata/ajr0"], &["kaista-numerointi/kanu11"])));
        assert!(!on_main_lane(&laned("c", &["ajorata/ajr0"], &["kaista-numerointi/kanu21"])));
        assert!(on_main_lane(&laned("d", &["ajorata/ajr1"], &["kaista-numerointi/kanu21"])));
        assert!(!on_main_lane(&laned("e", &["ajorata/ajr1"], &["kaista-numerointi/kanu12"])));
    }

    #[test]
    fn filter_and_value_use_the_source_path() {
        let mut state = RunState::default();
        state
            .source_path_by_oid
            .insert("a".into(), "paallyste-ja-pintarakenne/muut-pintarakenteet".into());
        state
            .source_path_by_oid
            .insert("b".into(), "paallyste-ja-pintarakenne/pintaukset".into());

        let records = vec![
            pavement("a", json!({"materiaali": "paallystetyyppi/pt01"})),
            pavement("b", json!({"materiaali": "paallystetyyppi/pt01"})),
            pavement("c", json!({"materiaali": "paallystetyyppi/pt01"})),
        ];
        let s = PavedSurfaceStrategy;
        let kept = s.filter_unnecessary(records, &state);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].oid, "a");

        let value = s.derive_output_value(&kept[0], &state).unwrap();
        assert_eq!(
            value.properties(),
            &[PropertyValue::single_choice(PAVEMENT_CLASS_PROPERTY, 1)]
        );
        assert!(s.accepts_update(&kept[0], &state));
        assert!(!s.accepts_update(&pavement("b", json!({})), &state));
    }
}
