use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    merge::{MergeCandidate, merge_segments},
    model::{DestinationRecord, LinkLocator, NewAssetRow, Provenance, RoadLink, SourceAsset, SupersedeRow},
    resolver::ResolvedAsset,
    strategy::{AssetTypeStrategy, Placement, RunState},
};

/// Rows ready for the writer.
#[derive(Debug, Default)]
pub(super) struct Rows {
    pub inserts: Vec<NewAssetRow>,
    pub supersedes: Vec<SupersedeRow>,
    /// Assets the strategy could not derive a value for.
    pub without_value: usize,
    /// Distinct sources whose rows were withheld because a record they
    /// replace would lose a segment.
    pub held_back: usize,
}

/// Turns filtered assets into destination rows.
///
/// A point asset is placed on its first locator. Range locators are merged
/// when the strategy asks for it. A row whose contributing ids include a
/// rewritten source supersedes every record those sources had; other rows are
/// plain inserts.
///
/// A replaced record is only expired when every id it carries is placed again
/// in this run. Otherwise every row touching it, and transitively every row
/// touching the records of those rows, is withheld and the records stay
/// active.
pub(super) fn build_rows<S>(
    strategy: &S,
    kept: &[ResolvedAsset],
    links: &HashMap<String, RoadLink>,
    state: &RunState,
    rewritten: &HashSet<String>,
    replaced: &IndexMap<String, Vec<DestinationRecord>>,
) -> Rows
where
    S: AssetTypeStrategy + ?Sized,
{
    let mut rows = Rows::default();
    let mut placements: Vec<Placement<'_>> = Vec::new();
    let mut candidates: Vec<MergeCandidate> = Vec::new();

    for r in kept {
        let Some(value) = strategy.derive_output_value(&r.asset, state) else {
            debug!(oid = %r.asset.oid, "no output value, asset skipped");
            rows.without_value += 1;
            continue;
        };
        let mut placed_point = false;
        for loc in &r.locators {
            let Some(link) = links.get(&loc.link_id) else {
                continue;
            };
            let side_code = strategy.side_code(&r.asset, loc, link, state);
            match loc.end {
                Some(end) if strategy.merges_segments() => candidates.push(MergeCandidate {
                    external_ids: vec![r.asset.oid.clone()],
                    link_id: loc.link_id.clone(),
                    start: loc.start,
                    end,
                    value: value.clone(),
                    municipality_code: loc.municipality_code,
                    side_code,
                }),
                None if placed_point => continue,
                _ => {
                    placed_point |= loc.end.is_none();
                    placements.push(Placement {
                        external_ids: vec![r.asset.oid.clone()],
                        source: &r.asset,
                        locator: loc.clone(),
                        side_code,
                        value: value.clone(),
                    });
                }
            }
        }
    }

    if !candidates.is_empty() {
        let sources: HashMap<&str, &SourceAsset> =
            kept.iter().map(|r| (r.asset.oid.as_str(), &r.asset)).collect();
        let before = candidates.len();
        let merged = merge_segments(candidates);
        debug!(before, after = merged.len(), "segments merged");
        for c in merged {
            let Some(source) = c
                .external_ids
                .first()
                .and_then(|id| sources.get(id.as_str()).copied())
            else {
                continue;
            };
            placements.push(Placement {
                locator: LinkLocator {
                    link_id: c.link_id,
                    start: c.start,
                    end: Some(c.end),
                    municipality_code: c.municipality_code,
                    side_code: c.side_code,
                },
                external_ids: c.external_ids,
                source,
                side_code: c.side_code,
                value: c.value,
            });
        }
    }

    let placed: HashSet<String> = placements
        .iter()
        .flat_map(|p| p.external_ids.iter().cloned())
        .collect();

    let mut planned: Vec<(Placement<'_>, Vec<&DestinationRecord>)> = Vec::new();
    for p in placements {
        let mut replaces: Vec<&DestinationRecord> = Vec::new();
        for record in p
            .external_ids
            .iter()
            .filter(|id| rewritten.contains(id.as_str()))
            .filter_map(|id| replaced.get(id))
            .flatten()
        {
            if !replaces.iter().any(|r| r.id == record.id) {
                replaces.push(record);
            }
        }
        planned.push((p, replaces));
    }

    let mut frozen: HashSet<i64> = planned
        .iter()
        .flat_map(|(_, replaces)| replaces.iter())
        .filter(|r| r.external_ids().iter().any(|id| !placed.contains(*id)))
        .map(|r| r.id)
        .collect();
    let mut withheld = vec![false; planned.len()];
    while !frozen.is_empty() {
        let before = withheld.iter().filter(|w| **w).count();
        for (i, (_, replaces)) in planned.iter().enumerate() {
            if !withheld[i] && replaces.iter().any(|r| frozen.contains(&r.id)) {
                withheld[i] = true;
                frozen.extend(replaces.iter().map(|r| r.id));
            }
        }
        if withheld.iter().filter(|w| **w).count() == before {
            break;
        }
    }

    let mut held: HashSet<String> = HashSet::new();
    for ((p, replaces), withheld) in planned.into_iter().zip(withheld) {
        if withheld {
            debug!(ids = ?p.external_ids, "row withheld, a replaced record is incomplete");
            held.extend(p.external_ids);
            continue;
        }
        let row = strategy.to_destination_rows(p);
        if replaces.is_empty() {
            rows.inserts.push(row);
        } else {
            rows.supersedes.push(SupersedeRow {
                replaces: replaces.iter().map(|r| r.id).collect(),
                provenance: earliest_provenance(&replaces),
                row,
            });
        }
    }
    rows.held_back = held.len();
    rows
}

fn earliest_provenance(records: &[&DestinationRecord]) -> Provenance {
    records
        .iter()
        .min_by_key(|r| (r.created_date.is_none(), r.created_date))
        .map(|r| Provenance {
            created_by: r.created_by.clone(),
            created_date: r.created_date,
        })
        .unwrap_or(Provenance {
            created_by: None,
            created_date: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Polyline,
        model::SideCode,
        strategy::{LinearStrategy, PavedSurfaceStrategy},
    };
    use chrono::NaiveDate;
    use serde_json::json;

    fn asset(oid: &str) -> SourceAsset {
        SourceAsset::from_value(json!({ "oid": oid })).unwrap()
    }

    fn range(oid: &str, link: &str, start: f64, end: f64) -> ResolvedAsset {
        ResolvedAsset {
            asset: asset(oid),
            locators: vec![LinkLocator {
                link_id: link.into(),
                start,
                end: Some(end),
                municipality_code: Some(91),
                side_code: SideCode::BothDirections,
            }],
        }
    }

    fn links() -> HashMap<String, RoadLink> {
        [("L1", SideCode::BothDirections)]
            .into_iter()
            .map(|(id, side_code)| {
                (
                    id.to_owned(),
                    RoadLink {
                        link_id: id.into(),
                        side_code,
                        length: 100.0,
                        municipality_code: Some(91),
                        geometry: Polyline::default(),
                    },
                )
            })
            .collect()
    }

    fn record(id: i64, ext: &str, day: u32, by: &str) -> DestinationRecord {
        DestinationRecord {
            id,
            external_id: Some(ext.into()),
            created_by: Some(by.into()),
            created_date: NaiveDate::from_ymd_opt(2022, 1, day).and_then(|d| d.and_hms_opt(8, 0, 0)),
            modified_by: None,
            modified_date: None,
            valid_to: None,
            link_id: "L1".into(),
            start_measure: Some(0.0),
            end_measure: Some(30.0),
            municipality_code: Some(91),
        }
    }

    #[test]
    fn generic_linear_records_are_not_merged_across_ids() {
        let kept = [range("a", "L1", 0.0, 30.0), range("b", "L1", 30.0, 60.0)];
        let rows = build_rows(
            &LinearStrategy,
            &kept,
            &links(),
            &RunState::default(),
            &HashSet::new(),
            &IndexMap::new(),
        );
        // each record's value is its own id, so nothing merges
        assert_eq!(rows.inserts.len(), 2);
        assert!(rows.supersedes.is_empty());
        assert_eq!(rows.inserts[0].external_id, "a");
        assert_eq!(rows.inserts[1].start_measure, 30.0);
        assert_eq!(rows.inserts[1].side_code, SideCode::BothDirections.code());
    }

    #[test]
    fn updated_sources_supersede_their_records_with_earliest_provenance() {
        let kept = [range("a", "L1", 0.0, 30.0)];
        let mut replaced = IndexMap::new();
        replaced.insert(
            "a".to_owned(),
            vec![record(7, "a", 20, "later"), record(3, "a", 2, "first"), record(7, "a", 20, "later")],
        );
        let updated = HashSet::from(["a".to_owned()]);

        let rows = build_rows(&LinearStrategy, &kept, &links(), &RunState::default(), &updated, &replaced);
        assert!(rows.inserts.is_empty());
        let s = &rows.supersedes[0];
        assert_eq!(s.replaces, vec![7, 3]);
        assert_eq!(s.provenance.created_by.as_deref(), Some("first"));
        assert_eq!(s.row.external_id, "a");
        assert!(s.row.properties.is_empty());
    }

    #[test]
    fn carried_partner_is_rebuilt_into_the_shared_record() {
        let mut a = range("a", "L1", 0.0, 50.0);
        let mut b = range("b", "L1", 50.0, 100.0);
        let mut state = RunState::default();
        for r in [&mut a, &mut b] {
            let oid = r.asset.oid.clone();
            r.asset = SourceAsset::from_value(json!({
                "oid": oid,
                "ominaisuudet": {"materiaali": "paallystetyyppi/pt01"},
            }))
            .unwrap();
            state
                .source_path_by_oid
                .insert(oid, "paallyste-ja-pintarakenne/muut-pintarakenteet".into());
        }
        let shared = record(9, "a,b", 1, "import");
        let replaced: IndexMap<String, Vec<DestinationRecord>> = [
            ("a".to_owned(), vec![shared.clone()]),
            ("b".to_owned(), vec![shared]),
        ]
        .into_iter()
        .collect();
        let rewritten = HashSet::from(["a".to_owned(), "b".to_owned()]);

        let rows = build_rows(
            &PavedSurfaceStrategy,
            &[a.clone(), b],
            &links(),
            &state,
            &rewritten,
            &replaced,
        );
        assert!(rows.inserts.is_empty());
        assert_eq!(rows.supersedes.len(), 1);
        let s = &rows.supersedes[0];
        assert_eq!(s.replaces, vec![9]);
        assert_eq!(s.row.external_id, "a,b");
        assert_eq!((s.row.start_measure, s.row.end_measure), (0.0, Some(100.0)));
        assert_eq!(rows.held_back, 0);

        // without b the shared record cannot be rebuilt, so nothing is written
        let rows = build_rows(
            &PavedSurfaceStrategy,
            &[a],
            &links(),
            &state,
            &rewritten,
            &replaced,
        );
        assert!(rows.supersedes.is_empty());
        assert!(rows.inserts.is_empty());
        assert_eq!(rows.held_back, 1);
    }

    #[test]
    fn points_use_their_first_locator() {
        let mut r = range("p", "L1", 12.0, 0.0);
        r.locators[0].end = None;
        let mut second = r.locators[0].clone();
        second.start = 40.0;
        r.locators.push(second);

        let rows = build_rows(
            &crate::strategy::PointStrategy,
            &[r],
            &links(),
            &RunState::default(),
            &HashSet::new(),
            &IndexMap::new(),
        );
        assert_eq!(rows.inserts.len(), 1);
        assert_eq!(rows.inserts[0].start_measure, 12.0);
    }
}
