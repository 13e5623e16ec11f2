//! Destination store against a real PostGIS database.
//!
//! Runs only when `TEST_DATABASE_URL` is set (a `.env` file is honoured).
//! Every test truncates the destination tables, so point it at a scratch
//! database.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use road_asset_sync::{
    db::{migrate, pool::build_pool},
    error::ErrorKind,
    model::{NewAssetRow, PropertyValue, Provenance, SideCode, SupersedeRow},
    schema::{administrative_class, traffic_direction},
    store::{DestinationStore, PgStore, WriterIdentity},
};
use secrecy::SecretString;
use serial_test::serial;

const TEST_DB_ENV: &str = "TEST_DATABASE_URL";
const SIGNS: i32 = 300;

const SEED: &[&str] = &[
    "TRUNCATE single_choice_value, number_property_value, text_property_value, enumerated_value, \
     property, asset_link, lrm_position, asset, administrative_class, traffic_direction, \
     kgv_roadlink, municipality CASCADE",
    "INSERT INTO municipality (id, name_fi, ely_nro) VALUES \
     (91, 'Helsinki', 1), (49, 'Espoo', 1), (837, 'Tampere', 3)",
    "INSERT INTO kgv_roadlink (linkid, adminclass, directiontype, municipalitycode, geometrylength, shape) VALUES \
     ('L1', 1, 0, 91, NULL, ST_GeomFromText('LINESTRING Z(0 0 0, 0 100 0)', 3067)), \
     ('L2', 2, 1, 91, 80, ST_GeomFromText('LINESTRING Z(0 100 0, 0 180 0)', 3067)), \
     ('L3', 1, 0, 49, 50, ST_GeomFromText('LINESTRING Z(0 180 0, 0 230 0)', 3067))",
    "INSERT INTO administrative_class (link_id, administrative_class, valid_to) VALUES \
     ('L2', 3, '2020-01-01'), ('L2', 1, NULL), ('L3', 3, NULL)",
    "INSERT INTO traffic_direction (link_id, traffic_direction, valid_to) VALUES \
     ('L1', 3, '2020-01-01'), ('L1', 4, NULL)",
    "INSERT INTO property (id, asset_type_id, public_id, property_type) VALUES \
     (1, 300, 'trafficSigns_type', 'single_choice'), \
     (2, 300, 'trafficSigns_value', 'number'), \
     (3, 300, 'trafficSigns_info', 'text')",
    "INSERT INTO enumerated_value (property_id, value, name_fi) VALUES (1, 36, 'Nopeusrajoitus')",
];

async fn setup() -> Option<(PgStore, AsyncPgConnection)> {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var(TEST_DB_ENV) else {
        eprintln!("{TEST_DB_ENV} not set, skipping");
        return None;
    };
    let secret = SecretString::new(url.clone().into());
    migrate::run_pending(secret.clone()).await.unwrap();

    let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
    for stmt in SEED {
        diesel::sql_query(*stmt).execute(&mut conn).await.unwrap();
    }
    Some((PgStore::new(build_pool(&secret, 2).unwrap()), conn))
}

fn sign_row(external_id: &str, measure: f64, sign_type: i32) -> NewAssetRow {
    NewAssetRow {
        external_id: external_id.into(),
        municipality_code: Some(91),
        link_id: "L1".into(),
        start_measure: measure,
        end_measure: None,
        side_code: SideCode::TowardsDigitizing.code(),
        geometry_wkt: Some(format!("POINT(0 {measure} 0)")),
        bearing: Some(2),
        properties: vec![
            PropertyValue::single_choice("trafficSigns_type", sign_type),
            PropertyValue::number("trafficSigns_value", 80.0),
            PropertyValue::text("trafficSigns_info", "koulu"),
        ],
    }
}

#[tokio::test]
#[serial]
async fn municipalities_by_region() {
    let Some((store, _conn)) = setup().await else { return };
    let mut ids = store.municipalities(1).await.unwrap();
    ids.sort();
    assert_eq!(ids, vec![49, 91]);
    assert!(store.municipalities(14).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn public_links_follow_the_latest_admin_class() {
    let Some((store, _conn)) = setup().await else { return };
    let ids: Vec<String> = ["L1", "L2", "L3", "L9"].map(String::from).to_vec();
    let mut links = store.public_road_links(&ids).await.unwrap();
    links.sort_by(|a, b| a.link_id.cmp(&b.link_id));

    let got: Vec<_> = links
        .iter()
        .map(|l| (l.link_id.as_str(), l.side_code, l.length))
        .collect();
    assert_eq!(
        got,
        vec![
            ("L1", SideCode::TowardsDigitizing, 100.0),
            ("L2", SideCode::TowardsDigitizing, 80.0),
        ]
    );
    assert_eq!(links[0].geometry.0.len(), 2);
}

#[tokio::test]
#[serial]
async fn history_tables_map_their_value_columns() {
    let Some((_store, mut conn)) = setup().await else { return };
    let classes: Vec<(String, i32)> = administrative_class::table
        .filter(administrative_class::valid_to.is_null())
        .select((administrative_class::link_id, administrative_class::class))
        .order(administrative_class::link_id)
        .load(&mut conn)
        .await
        .unwrap();
    assert_eq!(classes, vec![("L2".to_owned(), 1), ("L3".to_owned(), 3)]);

    let directions: Vec<i32> = traffic_direction::table
        .filter(traffic_direction::link_id.eq("L1"))
        .filter(traffic_direction::valid_to.is_null())
        .select(traffic_direction::direction)
        .load(&mut conn)
        .await
        .unwrap();
    assert_eq!(directions, vec![4]);
}

#[tokio::test]
#[serial]
async fn insert_supersede_expire() {
    let Some((store, _conn)) = setup().await else { return };
    let writer = WriterIdentity::default();

    let n = store.insert(SIGNS, &[sign_row("s1", 10.0, 36)], &writer).await.unwrap();
    assert_eq!(n, 1);
    let active = store.active_records(SIGNS, &[91]).await.unwrap();
    assert_eq!(active.len(), 1);
    let first = active[0].clone();
    assert_eq!(first.external_id.as_deref(), Some("s1"));
    assert_eq!(first.created_by.as_deref(), Some("Tievelho-import"));
    assert_eq!((first.link_id.as_str(), first.start_measure), ("L1", Some(10.0)));

    let replacement = SupersedeRow {
        replaces: vec![first.id],
        provenance: Provenance {
            created_by: first.created_by.clone(),
            created_date: first.created_date,
        },
        row: sign_row("s1", 12.5, 36),
    };
    assert_eq!(store.supersede(SIGNS, &[replacement], &writer).await.unwrap(), 1);

    let active = store.active_records(SIGNS, &[91]).await.unwrap();
    assert_eq!(active.len(), 1);
    let second = &active[0];
    assert_ne!(second.id, first.id);
    assert_eq!(second.start_measure, Some(12.5));
    assert_eq!(second.created_date, first.created_date);
    assert_eq!(second.created_by, first.created_by);
    assert_eq!(second.modified_by.as_deref(), Some("Tievelho-update"));

    assert_eq!(store.expire(&[second.id], &writer).await.unwrap(), 1);
    assert!(store.active_records(SIGNS, &[91]).await.unwrap().is_empty());
    assert_eq!(store.expire(&[second.id], &writer).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn unknown_enumerated_value_rolls_back_the_insert() {
    let Some((store, _conn)) = setup().await else { return };
    let writer = WriterIdentity::default();

    let err = store
        .insert(SIGNS, &[sign_row("ok", 5.0, 36), sign_row("bad", 6.0, 99)], &writer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(store.active_records(SIGNS, &[91]).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn a_failed_batch_keeps_earlier_batches() {
    let Some((store, _conn)) = setup().await else { return };
    let store = store.with_write_batch_size(2);
    let writer = WriterIdentity::default();

    let rows = [
        sign_row("b1", 1.0, 36),
        sign_row("b2", 2.0, 36),
        sign_row("b3", 3.0, 36),
        sign_row("bad", 4.0, 99),
    ];
    let err = store.insert(SIGNS, &rows, &writer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);

    let mut ids: Vec<String> = store
        .active_records(SIGNS, &[91])
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.external_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["b1", "b2"]);
}

#[tokio::test]
#[serial]
async fn migrations_are_idempotent() {
    let Some(_) = setup().await else { return };
    let url = std::env::var(TEST_DB_ENV).unwrap();
    let applied = migrate::run_pending(SecretString::new(url.into())).await.unwrap();
    assert!(applied.is_empty());
}
