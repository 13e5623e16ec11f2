//! Registry code lists to destination enumerations for traffic signs.
//!
//! Every mapping is a pure function of the registry code; `None` means the
//! property is left unset.

use serde::{Deserialize, Serialize};

/// `puoli` to location specifier.
pub fn location_specifier(side: Option<&str>) -> Option<i32> {
    match side? {
        "puoli/p01" => Some(1),
        "puoli/p02" => Some(2),
        "puoli/p03" => Some(4),
        _ => None,
    }
}

/// Mounting type to structure.
pub fn structure(mounting: Option<&str>) -> Option<i32> {
    match mounting? {
        "liikennemerkki-kiinnitystapa/liikita01" | "liikennemerkki-kiinnitystapa/liikita02" => {
            Some(7)
        }
        _ => None,
    }
}

/// General condition class.
pub fn condition(class: Option<&str>) -> Option<i32> {
    match class? {
        "kuntoluokka/kl01" => Some(1),
        "kuntoluokka/kl02" => Some(2),
        "kuntoluokka/kl03" => Some(3),
        "kuntoluokka/kl04" => Some(4),
        "kuntoluokka/kl05" => Some(5),
        _ => None,
    }
}

/// Sign size; the registry orders sizes the other way round.
pub fn size(size: Option<&str>) -> Option<i32> {
    match size? {
        "liikennemerkki-koko/liikok03" => Some(1),
        "liikennemerkki-koko/liikok02" => Some(2),
        "liikennemerkki-koko/liikok01" => Some(3),
        _ => None,
    }
}

/// Reflective film type.
pub fn coating_type(film: Option<&str>) -> Option<i32> {
    match film? {
        "liikennemerkki-kalvotyyppi/liikalty02" => Some(1),
        "liikennemerkki-kalvotyyppi/liikalty03" => Some(2),
        "liikennemerkki-kalvotyyppi/liikalty04" => Some(3),
        _ => None,
    }
}

/// Sign material: plywood, aluminium, or anything else.
pub fn sign_material(material: Option<&str>) -> Option<i32> {
    match material? {
        "materiaali/ma02" => Some(1),
        "materiaali/ma01" => Some(2),
        _ => Some(3),
    }
}

/// Damage type of the first reported damage.
pub fn type_of_damage(damage: Option<&str>) -> Option<i32> {
    match damage? {
        "varusteet-vauriotyyppi/vavt33" => Some(1),
        "varusteet-vauriotyyppi/vavt42" => Some(2),
        "varusteet-vauriotyyppi/vavt30" => Some(3),
        _ => Some(4),
    }
}

/// Repair urgency; the two least urgent classes collapse into one.
pub fn urgency_of_repair(urgency: Option<&str>) -> Option<i32> {
    match urgency? {
        "korjauksen-kiireellisyysluokka/koki01" => Some(1),
        "korjauksen-kiireellisyysluokka/koki02" => Some(2),
        "korjauksen-kiireellisyysluokka/koki03" | "korjauksen-kiireellisyysluokka/koki04" => {
            Some(3)
        }
        _ => None,
    }
}

/// One row of the sign type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignTypeEntry {
    /// Destination sign type value.
    pub value: i32,
    /// Sign number under the current traffic law, e.g. `liilnro1`.
    #[serde(default)]
    pub new_law: Option<String>,
    /// Sign number under the previous decree, e.g. `liiasnro1`.
    #[serde(default)]
    pub old_law: Option<String>,
}

impl SignTypeEntry {
    fn new(value: i32, new_law: Option<&str>, old_law: Option<&str>) -> Self {
        Self {
            value,
            new_law: new_law.map(str::to_owned),
            old_law: old_law.map(str::to_owned),
        }
    }
}

/// Sign type lookup: by new-law code first, then by old-law code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignTypeTable {
    entries: Vec<SignTypeEntry>,
}

/// Last path segment of a code, so `liikennemerkki-lakinumero/liilnro1` and
/// `liilnro1` compare equal.
fn code(raw: &str) -> &str {
    raw.rsplit('/').next().unwrap_or(raw).trim()
}

impl SignTypeTable {
    /// Table with exactly `entries`.
    pub fn new(entries: Vec<SignTypeEntry>) -> Self {
        Self { entries }
    }

    /// The common warning and priority signs.
    pub fn builtin() -> Self {
        const ROWS: &[(i32, Option<&str>, Option<&str>)] = &[
            (147, None, Some("liiasnro224")),
            (36, Some("liilnro1"), Some("liiasnro1")),
            (37, Some("liilnro2"), Some("liiasnro2")),
            (38, Some("liilnro3"), Some("liiasnro3")),
            (39, Some("liilnro4"), Some("liiasnro4")),
            (41, Some("liilnro5"), Some("liiasnro6")),
            (40, Some("liilnro6"), Some("liiasnro5")),
            (82, Some("liilnro7"), Some("liiasnro7")),
            (83, Some("liilnro8"), Some("liiasnro8")),
            (84, Some("liilnro9"), Some("liiasnro9")),
            (200, Some("liilnro10"), Some("liiasnro10")),
            (201, Some("liilnro11"), Some("liiasnro11")),
            (42, Some("liilnro12"), Some("liiasnro12")),
            (202, Some("liilnro13"), Some("liiasnro235")),
            (85, Some("liilnro14"), Some("liiasnro13")),
            (203, Some("liilnro15"), Some("liiasnro14")),
            (86, Some("liilnro16"), Some("liiasnro15")),
            (204, Some("liilnro17"), Some("liiasnro16")),
            (87, Some("liilnro18"), Some("liiasnro17")),
            (205, Some("liilnro19"), None),
            (43, Some("liilnro20"), Some("liiasnro18")),
            (88, Some("liilnro21"), Some("liiasnro19")),
            (206, Some("liilnro22"), Some("liiasnro20")),
            (125, Some("liilnro23"), Some("liiasnro21")),
            (126, Some("liilnro24"), Some("liiasnro22")),
            (207, Some("liilnro25"), None),
            (89, Some("liilnro26"), Some("liiasnro23")),
            (127, Some("liilnro27"), Some("liiasnro24")),
            (208, Some("liilnro28"), None),
            (208, Some("liilnro29"), None),
            (128, Some("liilnro30"), Some("liiasnro25")),
            (128, Some("liilnro31"), Some("liiasnro25")),
            (129, Some("liilnro32"), Some("liiasnro26")),
            (129, Some("liilnro33"), Some("liiasnro26")),
            (129, Some("liilnro34"), Some("liiasnro26")),
            (129, Some("liilnro35"), Some("liiasnro26")),
            (90, Some("liilnro36"), Some("liiasnro27")),
            (209, Some("liilnro37"), Some("liiasnro28")),
            (91, Some("liilnro38"), Some("liiasnro29")),
            (130, Some("liilnro39"), Some("liiasnro30")),
            (131, Some("liilnro40"), Some("liiasnro31")),
        ];
        Self::new(
            ROWS.iter()
                .map(|&(value, new_law, old_law)| SignTypeEntry::new(value, new_law, old_law))
                .collect(),
        )
    }

    /// Adds `entries` in front, so they win over existing rows.
    pub fn with_overrides(self, mut entries: Vec<SignTypeEntry>) -> Self {
        entries.extend(self.entries);
        Self { entries }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destination sign type for a sign's law numbers.
    pub fn lookup(&self, new_law: Option<&str>, old_law: Option<&str>) -> Option<i32> {
        self.find_by(new_law, |e| e.new_law.as_deref())
            .or_else(|| self.find_by(old_law, |e| e.old_law.as_deref()))
    }

    fn find_by(
        &self,
        raw: Option<&str>,
        pick: impl Fn(&SignTypeEntry) -> Option<&str>,
    ) -> Option<i32> {
        let wanted = code(raw?);
        self.entries
            .iter()
            .find(|e| pick(e).is_some_and(|c| code(c) == wanted))
            .map(|e| e.value)
    }
}
