use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::{
    define_sql_function,
    prelude::*,
    sql_types::{Array, BigInt, Double, Integer, Nullable, Text},
};
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl, pooled_connection::deadpool::Object,
    scoped_futures::ScopedFutureExt,
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DestinationStore, LINK_SOURCE_NORMAL, WriterIdentity, adjusted_timestamp};
use crate::{
    db::pool::PgPool,
    error::SyncError,
    geometry::Polyline,
    model::{DestinationRecord, NewAssetRow, PropertyKind, Provenance, RoadLink, SideCode, SupersedeRow},
    schema::{
        asset, asset_link, enumerated_value, lrm_position, municipality, number_property_value,
        property, single_choice_value, text_property_value,
    },
};

const PRIMARY_KEY_SEQ: &str = "primary_key_seq";
/// Rows per write transaction unless configured otherwise.
const DEFAULT_WRITE_BATCH: usize = 50;
const POSITION_KEY_SEQ: &str = "lrm_position_primary_key_seq";

/// State administrative class.
const PUBLIC_ADMIN_CLASS: i32 = 1;

define_sql_function! {
    /// Postgres `nextval(regclass)`.
    fn nextval(sequence: Text) -> BigInt;
}

const PUBLIC_LINKS_SQL: &str = r#"
SELECT kr.linkid AS link_id,
       kr.municipalitycode AS municipality_code,
       COALESCE(kr.geometrylength, ST_Length(kr.shape)) AS length,
       (SELECT td.traffic_direction
          FROM traffic_direction td
         WHERE td.link_id = kr.linkid AND td.valid_to IS NULL
         ORDER BY td.created_date DESC NULLS LAST
         LIMIT 1) AS traffic_direction,
       kr.directiontype AS direction_type,
       ST_AsGeoJSON(kr.shape) AS geometry
  FROM kgv_roadlink kr
 WHERE kr.linkid = ANY($1)
   AND COALESCE(
         (SELECT ac.administrative_class
            FROM administrative_class ac
           WHERE ac.link_id = kr.linkid AND ac.valid_to IS NULL
           ORDER BY ac.created_date DESC NULLS LAST
           LIMIT 1),
         kr.adminclass) = $2
"#;

#[derive(QueryableByName)]
struct LinkRow {
    #[diesel(sql_type = Text)]
    link_id: String,
    #[diesel(sql_type = Nullable<Integer>)]
    municipality_code: Option<i32>,
    #[diesel(sql_type = Nullable<Double>)]
    length: Option<f64>,
    #[diesel(sql_type = Nullable<Integer>)]
    traffic_direction: Option<i32>,
    #[diesel(sql_type = Nullable<Integer>)]
    direction_type: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    geometry: Option<String>,
}

#[derive(Deserialize)]
struct GeoJsonLine {
    coordinates: Vec<Vec<f64>>,
}

fn parse_shape(link_id: &str, geojson: Option<&str>) -> Polyline {
    let Some(raw) = geojson else {
        return Polyline::default();
    };
    match serde_json::from_str::<GeoJsonLine>(raw) {
        Ok(line) => Polyline::from_coordinates(&line.coordinates),
        Err(e) => {
            warn!(link_id, error = %e, "link shape is not a line string");
            Polyline::default()
        }
    }
}

impl From<LinkRow> for RoadLink {
    fn from(r: LinkRow) -> Self {
        let geometry = parse_shape(&r.link_id, r.geometry.as_deref());
        RoadLink {
            side_code: SideCode::from_link_direction(r.traffic_direction, r.direction_type),
            length: r.length.unwrap_or_else(|| geometry.length()),
            municipality_code: r.municipality_code,
            geometry,
            link_id: r.link_id,
        }
    }
}

/// Property ids and enumerated value ids of one asset type, read once per
/// transaction.
struct PropertyCatalog {
    asset_type_id: i32,
    properties: HashMap<String, i64>,
    enumerated: HashMap<(i64, i32), i64>,
}

impl PropertyCatalog {
    async fn load(conn: &mut AsyncPgConnection, asset_type_id: i32) -> Result<Self, SyncError> {
        let properties = property::table
            .filter(property::asset_type_id.eq(asset_type_id))
            .select((property::public_id, property::id))
            .load::<(String, i64)>(conn)
            .await?
            .into_iter()
            .collect();
        let enumerated = enumerated_value::table
            .inner_join(property::table)
            .filter(property::asset_type_id.eq(asset_type_id))
            .select((
                enumerated_value::property_id,
                enumerated_value::value,
                enumerated_value::id,
            ))
            .load::<(i64, i32, i64)>(conn)
            .await?
            .into_iter()
            .map(|(property_id, value, id)| ((property_id, value), id))
            .collect();
        Ok(Self {
            asset_type_id,
            properties,
            enumerated,
        })
    }

    fn property(&self, public_id: &str) -> Result<i64, SyncError> {
        self.properties
            .get(public_id)
            .copied()
            .ok_or_else(|| SyncError::MissingProperty {
                asset_type_id: self.asset_type_id,
                public_id: public_id.to_owned(),
            })
    }

    fn enumerated(&self, property_id: i64, public_id: &str, value: i32) -> Result<i64, SyncError> {
        self.enumerated
            .get(&(property_id, value))
            .copied()
            .ok_or_else(|| SyncError::MissingEnumeratedValue {
                public_id: public_id.to_owned(),
                value,
            })
    }
}

/// Audit columns of one inserted row.
struct Audit<'a> {
    created_by: &'a str,
    created_date: NaiveDateTime,
    modified_by: Option<&'a str>,
    modified_date: Option<NaiveDateTime>,
    /// Transaction time.
    now: NaiveDateTime,
    adjusted_timestamp: i64,
}

async fn insert_row(
    conn: &mut AsyncPgConnection,
    catalog: &PropertyCatalog,
    row: &NewAssetRow,
    audit: &Audit<'_>,
) -> Result<i64, SyncError> {
    let asset_id: i64 = diesel::insert_into(asset::table)
        .values((
            asset::id.eq(nextval(PRIMARY_KEY_SEQ)),
            asset::external_id.eq(row.external_id.as_str()),
            asset::asset_type_id.eq(catalog.asset_type_id),
            asset::created_by.eq(audit.created_by),
            asset::created_date.eq(audit.created_date),
            asset::modified_by.eq(audit.modified_by),
            asset::modified_date.eq(audit.modified_date),
            asset::valid_from.eq(audit.now),
            asset::municipality_code.eq(row.municipality_code),
            asset::bearing.eq(row.bearing),
        ))
        .returning(asset::id)
        .get_result(conn)
        .await?;

    if let Some(wkt) = &row.geometry_wkt {
        diesel::sql_query("UPDATE asset SET geometry = ST_GeomFromText($1, 3067) WHERE id = $2")
            .bind::<Text, _>(wkt.as_str())
            .bind::<BigInt, _>(asset_id)
            .execute(conn)
            .await?;
    }

    let position_id: i64 = diesel::insert_into(lrm_position::table)
        .values((
            lrm_position::id.eq(nextval(POSITION_KEY_SEQ)),
            lrm_position::start_measure.eq(row.start_measure),
            lrm_position::end_measure.eq(row.end_measure),
            lrm_position::link_id.eq(row.link_id.as_str()),
            lrm_position::side_code.eq(row.side_code),
            lrm_position::adjusted_timestamp.eq(audit.adjusted_timestamp),
            lrm_position::link_source.eq(LINK_SOURCE_NORMAL),
            lrm_position::modified_date.eq(audit.now),
        ))
        .returning(lrm_position::id)
        .get_result(conn)
        .await?;

    diesel::insert_into(asset_link::table)
        .values((
            asset_link::asset_id.eq(asset_id),
            asset_link::position_id.eq(position_id),
        ))
        .execute(conn)
        .await?;

    let modifier = audit.modified_by.unwrap_or(audit.created_by);
    for p in &row.properties {
        let property_id = catalog.property(&p.public_id)?;
        match &p.value {
            PropertyKind::SingleChoice(value) => {
                let enumerated_id = catalog.enumerated(property_id, &p.public_id, *value)?;
                diesel::insert_into(single_choice_value::table)
                    .values((
                        single_choice_value::asset_id.eq(asset_id),
                        single_choice_value::enumerated_value_id.eq(enumerated_id),
                        single_choice_value::property_id.eq(property_id),
                        single_choice_value::modified_date.eq(audit.now),
                        single_choice_value::modified_by.eq(modifier),
                    ))
                    .execute(conn)
                    .await?;
            }
            PropertyKind::Number(value) => {
                diesel::insert_into(number_property_value::table)
                    .values((
                        number_property_value::id.eq(nextval(PRIMARY_KEY_SEQ)),
                        number_property_value::asset_id.eq(asset_id),
                        number_property_value::property_id.eq(property_id),
                        number_property_value::value.eq(*value),
                    ))
                    .execute(conn)
                    .await?;
            }
            PropertyKind::Text(value) => {
                diesel::insert_into(text_property_value::table)
                    .values((
                        text_property_value::id.eq(nextval(PRIMARY_KEY_SEQ)),
                        text_property_value::asset_id.eq(asset_id),
                        text_property_value::property_id.eq(property_id),
                        text_property_value::value_fi.eq(value.as_str()),
                        text_property_value::created_date.eq(audit.now),
                        text_property_value::created_by.eq(modifier),
                    ))
                    .execute(conn)
                    .await?;
            }
        }
    }
    Ok(asset_id)
}

/// Provenance of the earliest created row among those just expired.
fn earliest_provenance(expired: Vec<(Option<String>, Option<NaiveDateTime>)>) -> Option<Provenance> {
    expired
        .into_iter()
        .min_by_key(|(_, created)| (created.is_none(), *created))
        .map(|(created_by, created_date)| Provenance {
            created_by,
            created_date,
        })
}

async fn transaction_time(conn: &mut AsyncPgConnection) -> Result<NaiveDateTime, SyncError> {
    Ok(diesel::select(diesel::dsl::now)
        .get_result::<NaiveDateTime>(conn)
        .await?)
}

/// Splits supersede rows into write batches of about `size` rows. Rows that
/// replace a common record always land in the same batch, which may then
/// exceed `size`.
fn supersede_batches(rows: &[SupersedeRow], size: usize) -> Vec<Vec<&SupersedeRow>> {
    let size = size.max(1);
    let mut groups: Vec<(Vec<i64>, Vec<&SupersedeRow>)> = Vec::new();
    for row in rows {
        let (mut ids, mut members) = (row.replaces.clone(), vec![row]);
        // fold every group sharing a record into this row's group
        let mut i = 0;
        while i < groups.len() {
            if groups[i].0.iter().any(|id| ids.contains(id)) {
                let (other_ids, mut other_members) = groups.remove(i);
                ids.extend(other_ids);
                other_members.append(&mut members);
                members = other_members;
                i = 0;
            } else {
                i += 1;
            }
        }
        groups.push((ids, members));
    }

    let mut batches: Vec<Vec<&SupersedeRow>> = Vec::new();
    for (_, members) in groups {
        match batches.last_mut() {
            Some(batch) if batch.len() + members.len() <= size => batch.extend(members),
            _ => batches.push(members),
        }
    }
    batches
}

/// Postgres implementation of [`DestinationStore`].
///
/// Inserts and supersedes are written in batches, one transaction each.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    write_batch_size: usize,
}

impl PgStore {
    /// Store backed by `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            write_batch_size: DEFAULT_WRITE_BATCH,
        }
    }

    /// Rows per write transaction.
    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size.max(1);
        self
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, SyncError> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::Pool(e.to_string()))
    }
}

#[async_trait]
impl DestinationStore for PgStore {
    async fn municipalities(&self, region: i32) -> Result<Vec<i32>, SyncError> {
        let mut conn = self.conn().await?;
        let ids = municipality::table
            .filter(municipality::ely_nro.eq(region))
            .select(municipality::id)
            .order(municipality::id)
            .load::<i32>(&mut *conn)
            .await?;
        Ok(ids)
    }

    async fn active_records(
        &self,
        asset_type_id: i32,
        municipalities: &[i32],
    ) -> Result<Vec<DestinationRecord>, SyncError> {
        let mut conn = self.conn().await?;
        let records = asset::table
            .inner_join(asset_link::table.inner_join(lrm_position::table))
            .filter(asset::asset_type_id.eq(asset_type_id))
            .filter(asset::valid_to.is_null())
            .filter(asset::municipality_code.eq_any(municipalities.to_vec()))
            .select((
                asset::id,
                asset::external_id,
                asset::created_by,
                asset::created_date,
                asset::modified_by,
                asset::modified_date,
                asset::valid_to,
                lrm_position::link_id,
                lrm_position::start_measure,
                lrm_position::end_measure,
                asset::municipality_code,
            ))
            .order(asset::id)
            .load::<DestinationRecord>(&mut *conn)
            .await?;
        debug!(count = records.len(), asset_type_id, "active destination records read");
        Ok(records)
    }

    async fn public_road_links(&self, link_ids: &[String]) -> Result<Vec<RoadLink>, SyncError> {
        if link_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let rows = diesel::sql_query(PUBLIC_LINKS_SQL)
            .bind::<Array<Text>, _>(link_ids.to_vec())
            .bind::<Integer, _>(PUBLIC_ADMIN_CLASS)
            .load::<LinkRow>(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(RoadLink::from).collect())
    }

    async fn expire(&self, ids: &[i64], writer: &WriterIdentity) -> Result<usize, SyncError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction(|c| {
            async move {
                let tx_time = transaction_time(c).await?;
                let n = diesel::update(
                    asset::table
                        .filter(asset::id.eq_any(ids.to_vec()))
                        .filter(asset::valid_to.is_null()),
                )
                .set((
                    asset::valid_to.eq(tx_time),
                    asset::modified_by.eq(writer.modified_by.as_str()),
                    asset::modified_date.eq(tx_time),
                ))
                .execute(c)
                .await?;
                Ok::<_, SyncError>(n)
            }
            .scope_boxed()
        })
        .await
    }

    async fn insert(
        &self,
        asset_type_id: i32,
        rows: &[NewAssetRow],
        writer: &WriterIdentity,
    ) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let adjusted = adjusted_timestamp(Utc::now());
        let mut conn = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        let mut written = 0;
        for batch in rows.chunks(self.write_batch_size) {
            written += conn
                .transaction(|c| {
                    async move {
                        let tx_time = transaction_time(c).await?;
                        let catalog = PropertyCatalog::load(c, asset_type_id).await?;
                        let audit = Audit {
                            created_by: &writer.created_by,
                            created_date: tx_time,
                            modified_by: None,
                            modified_date: None,
                            now: tx_time,
                            adjusted_timestamp: adjusted,
                        };
                        for row in batch {
                            insert_row(c, &catalog, row, &audit).await?;
                        }
                        Ok::<_, SyncError>(batch.len())
                    }
                    .scope_boxed()
                })
                .await?;
            debug!(written, total = rows.len(), "insert batch committed");
        }
        Ok(written)
    }

    async fn supersede(
        &self,
        asset_type_id: i32,
        rows: &[SupersedeRow],
        writer: &WriterIdentity,
    ) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let adjusted = adjusted_timestamp(Utc::now());
        let mut conn = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        let mut written = 0;
        for batch in supersede_batches(rows, self.write_batch_size) {
            let batch = &batch;
            written += conn
                .transaction(|c| {
                    async move {
                        let tx_time = transaction_time(c).await?;
                        let catalog = PropertyCatalog::load(c, asset_type_id).await?;
                        for s in batch {
                            let expired = diesel::update(
                                asset::table
                                    .filter(asset::id.eq_any(s.replaces.clone()))
                                    .filter(asset::valid_to.is_null()),
                            )
                            .set((
                                asset::valid_to.eq(tx_time),
                                asset::modified_by.eq(writer.modified_by.as_str()),
                                asset::modified_date.eq(tx_time),
                            ))
                            .returning((asset::created_by, asset::created_date))
                            .get_results::<(Option<String>, Option<NaiveDateTime>)>(c)
                            .await?;

                            // rows sharing a replaced record find it already expired
                            let provenance =
                                earliest_provenance(expired).unwrap_or_else(|| s.provenance.clone());
                            let audit = Audit {
                                created_by: provenance
                                    .created_by
                                    .as_deref()
                                    .unwrap_or(&writer.created_by),
                                created_date: provenance.created_date.unwrap_or(tx_time),
                                modified_by: Some(&writer.modified_by),
                                modified_date: Some(tx_time),
                                now: tx_time,
                                adjusted_timestamp: adjusted,
                            };
                            insert_row(c, &catalog, &s.row, &audit).await?;
                        }
                        Ok::<_, SyncError>(batch.len())
                    }
                    .scope_boxed()
                })
                .await?;
            debug!(written, total = rows.len(), "supersede batch committed");
        }
        Ok(written)
    }
}
