#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use road_asset_sync::{
    error::SyncError,
    geometry::{Point, Polyline},
    model::{DestinationRecord, NewAssetRow, RoadLink, SideCode, SupersedeRow},
    store::{DestinationStore, WriterIdentity},
};
use road_data_client::{
    errors::{ClientError, StatusCode},
    providers::{
        AddressConverter, RecordSource,
        converter::{ConversionFeature, ConversionRequest, ConvertedLocation},
    },
};
use serde_json::Value;

pub const MUNICIPALITY: i32 = 91;

pub fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

/// Registry serving fixed records per source path.
#[derive(Default)]
pub struct FakeRegistry {
    pub records: HashMap<String, Vec<Value>>,
}

impl FakeRegistry {
    pub fn with(mut self, path: &str, records: Vec<Value>) -> Self {
        self.records.insert(path.to_owned(), records);
        self
    }
}

#[async_trait]
impl RecordSource for FakeRegistry {
    async fn fetch_records(
        &self,
        _region: &str,
        source_path: &str,
    ) -> Result<Vec<Value>, ClientError> {
        self.records
            .get(source_path)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                url: format!("http://registry/{source_path}"),
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            })
    }
}

/// Converter answering from lookup tables; anything unknown comes back as a
/// failed feature.
#[derive(Default)]
pub struct FakeConverter {
    /// (road, part, distance) to (link, measure).
    pub points: HashMap<(i64, i64, i64), (String, f64)>,
    /// (road, part, distance, end part, end distance) to start and end link positions.
    pub ranges: HashMap<(i64, i64, i64, i64, i64), ((String, f64), (String, f64))>,
    /// (start link, end link) to traversed (link, start, end). A range within
    /// one link needs no entry.
    pub intervals: HashMap<(String, String), Vec<(String, f64, f64)>>,
    /// Link to road-address distance at its first and last point.
    pub link_distances: HashMap<String, (i64, i64)>,
    pub batches: AtomicUsize,
}

impl FakeConverter {
    pub fn point(mut self, address: (i64, i64, i64), link: &str, measure: f64) -> Self {
        self.points.insert(address, (link.to_owned(), measure));
        self
    }

    pub fn range(
        mut self,
        address: (i64, i64, i64, i64, i64),
        start: (&str, f64),
        end: (&str, f64),
    ) -> Self {
        self.ranges.insert(
            address,
            ((start.0.to_owned(), start.1), (end.0.to_owned(), end.1)),
        );
        self
    }

    pub fn interval(mut self, start: &str, end: &str, links: &[(&str, f64, f64)]) -> Self {
        self.intervals.insert(
            (start.to_owned(), end.to_owned()),
            links.iter().map(|&(l, a, b)| (l.to_owned(), a, b)).collect(),
        );
        self
    }

    pub fn link_distances(mut self, link: &str, start: i64, end: i64) -> Self {
        self.link_distances.insert(link.to_owned(), (start, end));
        self
    }

    fn located(token: &str, link: &str, measure: f64) -> ConvertedLocation {
        ConvertedLocation {
            token: token.to_owned(),
            link_id: link.to_owned(),
            measure,
            municipality_code: Some(MUNICIPALITY),
            ..Default::default()
        }
    }

    fn answer(&self, r: &ConversionRequest) -> Vec<ConversionFeature> {
        let failed = || {
            vec![ConversionFeature::Failed {
                token: Some(r.token.clone()),
                message: "Kohdetta ei löytynyt".into(),
            }]
        };

        if r.interval_search == Some(true) {
            let (Some(a), Some(b), Some(m0), Some(m1)) =
                (&r.link_id, &r.end_link_id, r.measure, r.end_measure)
            else {
                return failed();
            };
            if a == b {
                return vec![ConversionFeature::Located(ConvertedLocation {
                    end_measure: Some(m1),
                    ..Self::located(&r.token, a, m0)
                })];
            }
            return match self.intervals.get(&(a.clone(), b.clone())) {
                Some(links) => links
                    .iter()
                    .map(|(l, m0, m1)| {
                        ConversionFeature::Located(ConvertedLocation {
                            end_measure: Some(*m1),
                            ..Self::located(&r.token, l, *m0)
                        })
                    })
                    .collect(),
                None => failed(),
            };
        }

        match (r.road, r.part, r.distance, r.end_part, r.end_distance) {
            (Some(road), Some(part), Some(d), Some(ep), Some(ed)) => {
                match self.ranges.get(&(road, part, d, ep, ed)) {
                    Some(((l0, m0), (l1, m1))) => vec![ConversionFeature::Located(ConvertedLocation {
                        end_link_id: Some(l1.clone()),
                        end_measure: Some(*m1),
                        ..Self::located(&r.token, l0, *m0)
                    })],
                    None => failed(),
                }
            }
            (Some(road), Some(part), Some(d), None, None) => match self.points.get(&(road, part, d)) {
                Some((l, m)) => vec![ConversionFeature::Located(Self::located(&r.token, l, *m))],
                None => failed(),
            },
            _ => {
                let (Some(link), Some(m)) = (&r.link_id, r.measure) else {
                    return failed();
                };
                match self.link_distances.get(link) {
                    Some(&(start, end)) => vec![ConversionFeature::Located(ConvertedLocation {
                        part: Some(1),
                        distance: Some(if m == 0.0 { start } else { end }),
                        ..Self::located(&r.token, link, m)
                    })],
                    None => failed(),
                }
            }
        }
    }
}

#[async_trait]
impl AddressConverter for FakeConverter {
    async fn convert(
        &self,
        batch: &[ConversionRequest],
    ) -> Result<Vec<ConversionFeature>, ClientError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(batch.iter().flat_map(|r| self.answer(r)).collect())
    }
}

/// A public link running north from the origin.
pub fn north_link(id: &str, side_code: SideCode) -> RoadLink {
    RoadLink {
        link_id: id.to_owned(),
        side_code,
        length: 100.0,
        municipality_code: Some(MUNICIPALITY),
        geometry: Polyline(vec![Point::new(0.0, 0.0), Point::new(0.0, 100.0)]),
    }
}

#[derive(Default)]
pub struct MemoryState {
    /// Every record ever written, active or not.
    pub records: Vec<DestinationRecord>,
    pub next_id: i64,
    pub inserted: Vec<NewAssetRow>,
    pub superseded: Vec<SupersedeRow>,
    pub expire_calls: usize,
}

/// In-memory destination store.
pub struct MemoryStore {
    pub municipalities: Vec<i32>,
    pub links: Vec<RoadLink>,
    pub now: NaiveDateTime,
    pub fail_writes: bool,
    pub state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            municipalities: vec![MUNICIPALITY],
            links: Vec::new(),
            now: at(2024, 5, 2),
            fail_writes: false,
            state: Mutex::new(MemoryState {
                next_id: 1000,
                ..MemoryState::default()
            }),
        }
    }
}

impl MemoryStore {
    pub fn with_links(mut self, links: Vec<RoadLink>) -> Self {
        self.links = links;
        self
    }

    pub fn with_record(self, id: i64, external_id: &str, link: &str, modified: NaiveDateTime) -> Self {
        self.with_segment(id, external_id, (link, 0.0, None), modified)
    }

    pub fn with_segment(
        self,
        id: i64,
        external_id: &str,
        (link, start, end): (&str, f64, Option<f64>),
        modified: NaiveDateTime,
    ) -> Self {
        self.state.lock().unwrap().records.push(DestinationRecord {
            id,
            external_id: Some(external_id.to_owned()),
            created_by: Some("Tievelho-import".into()),
            created_date: Some(at(2021, 3, 1)),
            modified_by: None,
            modified_date: Some(modified),
            valid_to: None,
            link_id: link.to_owned(),
            start_measure: Some(start),
            end_measure: end,
            municipality_code: Some(MUNICIPALITY),
        });
        self
    }

    pub fn active(&self) -> Vec<DestinationRecord> {
        let state = self.state.lock().unwrap();
        state.records.iter().filter(|r| r.valid_to.is_none()).cloned().collect()
    }

    pub fn active_external_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .active()
            .into_iter()
            .filter_map(|r| r.external_id)
            .collect();
        ids.sort();
        ids
    }

    fn check_writable(&self) -> Result<(), SyncError> {
        if self.fail_writes {
            Err(SyncError::Database(diesel::result::Error::RollbackTransaction))
        } else {
            Ok(())
        }
    }

    fn push_row(
        &self,
        state: &mut MemoryState,
        row: &NewAssetRow,
        created_by: Option<String>,
        created_date: Option<NaiveDateTime>,
        modified_by: Option<String>,
    ) {
        state.next_id += 1;
        let record = DestinationRecord {
            id: state.next_id,
            external_id: Some(row.external_id.clone()),
            created_by,
            created_date,
            modified_date: modified_by.as_ref().map(|_| self.now),
            modified_by,
            valid_to: None,
            link_id: row.link_id.clone(),
            start_measure: Some(row.start_measure),
            end_measure: row.end_measure,
            municipality_code: row.municipality_code,
        };
        state.records.push(record);
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn municipalities(&self, _region: i32) -> Result<Vec<i32>, SyncError> {
        Ok(self.municipalities.clone())
    }

    async fn active_records(
        &self,
        _asset_type_id: i32,
        municipalities: &[i32],
    ) -> Result<Vec<DestinationRecord>, SyncError> {
        Ok(self
            .active()
            .into_iter()
            .filter(|r| r.municipality_code.is_some_and(|m| municipalities.contains(&m)))
            .collect())
    }

    async fn public_road_links(&self, link_ids: &[String]) -> Result<Vec<RoadLink>, SyncError> {
        Ok(self
            .links
            .iter()
            .filter(|l| link_ids.contains(&l.link_id))
            .cloned()
            .collect())
    }

    async fn expire(&self, ids: &[i64], _writer: &WriterIdentity) -> Result<usize, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.expire_calls += 1;
        if ids.is_empty() {
            return Ok(0);
        }
        self.check_writable()?;
        let mut n = 0;
        for r in state.records.iter_mut() {
            if ids.contains(&r.id) && r.valid_to.is_none() {
                r.valid_to = Some(self.now);
                n += 1;
            }
        }
        Ok(n)
    }

    async fn insert(
        &self,
        _asset_type_id: i32,
        rows: &[NewAssetRow],
        writer: &WriterIdentity,
    ) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            self.push_row(&mut state, row, Some(writer.created_by.clone()), Some(self.now), None);
            state.inserted.push(row.clone());
        }
        Ok(rows.len())
    }

    async fn supersede(
        &self,
        _asset_type_id: i32,
        rows: &[SupersedeRow],
        writer: &WriterIdentity,
    ) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        for s in rows {
            let mut expired = Vec::new();
            for r in state.records.iter_mut() {
                if s.replaces.contains(&r.id) && r.valid_to.is_none() {
                    r.valid_to = Some(self.now);
                    expired.push((r.created_by.clone(), r.created_date));
                }
            }
            let (created_by, created_date) = expired
                .into_iter()
                .min_by_key(|(_, d)| (d.is_none(), *d))
                .unwrap_or((s.provenance.created_by.clone(), s.provenance.created_date));
            self.push_row(
                &mut state,
                &s.row,
                created_by,
                created_date,
                Some(writer.modified_by.clone()),
            );
            state.superseded.push(s.clone());
        }
        Ok(rows.len())
    }
}
