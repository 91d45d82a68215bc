// These tests need running mongodb servers:
// SYNCER_TEST_SOURCE (column store) and SYNCER_TEST_TARGET (search index).
// Run them with `cargo test -- --ignored`.
use bson::{doc, Document};
use mongodb::sync::{Client, Database};
use recon_sync::blocking::store::bson_helper::new_binary;
use recon_sync::blocking::store::{ColumnStore, SearchIndex};
use recon_sync::record::{TimeWindow, WriteOp, WriteStatement};
use recon_sync::{
    CollectionSchema, Mapping, MongoColumnStore, MongoSearchIndex, ReconcileSyncer,
};
use uuid::Uuid;

const ID1: &str = "c050283e-3641-4d79-8e82-6665b7a4d19b";
const ID2: &str = "5a0c9a6c-5f3b-4d8e-9f0e-2b1a7c3d4e5f";

struct Context {
    column_db: Database,
    index_db: Database,
}

impl Context {
    fn new() -> Self {
        let column_db = Client::with_uri_str(
            option_env!("SYNCER_TEST_SOURCE").unwrap_or("mongodb://localhost:27017"),
        )
        .unwrap()
        .database("recon_test_column");
        let index_db = Client::with_uri_str(
            option_env!("SYNCER_TEST_TARGET").unwrap_or("mongodb://localhost:27018"),
        )
        .unwrap()
        .database("recon_test_index");
        Context {
            column_db,
            index_db,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.column_db.drop(None).unwrap();
        self.index_db.drop(None).unwrap();
    }
}

fn mapping() -> Mapping {
    Mapping::new(
        CollectionSchema::new("users", "id", "updated_at", vec!["name".to_string()]),
        CollectionSchema::new("user", "_id", "ts", vec!["full_name".to_string()]),
    )
    .unwrap()
}

#[test]
#[ignore = "requires running mongodb servers"]
fn test_column_store_scan_and_lookup() {
    let context = Context::new();
    let coll = context.column_db.collection::<Document>("users");
    coll.insert_many(
        vec![
            doc! {
                "id": new_binary(Uuid::parse_str(ID1).unwrap()),
                "updated_at": bson::DateTime::from_millis(100_000),
                "name": "a",
            },
            doc! {
                "id": new_binary(Uuid::parse_str(ID2).unwrap()),
                "updated_at": bson::DateTime::from_millis(200_000),
                "name": "b",
            },
        ],
        None,
    )
    .unwrap();

    let store = MongoColumnStore::new(context.column_db.clone());
    let m = mapping();
    let mut summaries = store.scan_summaries(m.source()).unwrap();
    summaries.sort_by_key(|s| s.timestamp);
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].timestamp, 100);
    assert_eq!(summaries[1].id, Uuid::parse_str(ID2).unwrap());

    let records = store
        .fetch_by_ids(m.source(), &[Uuid::parse_str(ID1).unwrap()])
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].values, vec![bson::Bson::String("a".to_string())]);
}

#[test]
#[ignore = "requires running mongodb servers"]
fn test_search_index_window_and_bulk() {
    let context = Context::new();
    let index = MongoSearchIndex::new(context.index_db.clone());
    let m = mapping();

    let response = index
        .bulk(
            m.sink(),
            vec![
                WriteStatement {
                    op: WriteOp::Insert,
                    id: ID1.to_string(),
                    timestamp: 100,
                    fields: doc! {"full_name": "a"},
                },
                WriteStatement {
                    op: WriteOp::Insert,
                    id: ID2.to_string(),
                    timestamp: 200,
                    fields: doc! {"full_name": "b"},
                },
            ],
        )
        .unwrap();
    assert_eq!(response.succeeded, 2);
    assert!(response.failed.is_empty());

    let windowed = index
        .search_summaries(m.sink(), Some(TimeWindow::new(150, 250)))
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].id, ID2);

    // update doesn't touch the id, and doesn't create documents.
    index
        .bulk(
            m.sink(),
            vec![WriteStatement {
                op: WriteOp::Update,
                id: "missing".to_string(),
                timestamp: 300,
                fields: doc! {"full_name": "c"},
            }],
        )
        .unwrap();
    let all = index.search_summaries(m.sink(), None).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
#[ignore = "requires running mongodb servers"]
fn test_sync_mapping_against_mongodb() {
    let context = Context::new();
    context
        .column_db
        .collection::<Document>("users")
        .insert_one(
            doc! {
                "id": new_binary(Uuid::parse_str(ID1).unwrap()),
                "updated_at": bson::DateTime::from_millis(100_000),
                "name": "a",
            },
            None,
        )
        .unwrap();
    context
        .index_db
        .collection::<Document>("user")
        .insert_one(doc! {"_id": ID2, "ts": 200_i64, "full_name": "b"}, None)
        .unwrap();

    let syncer = ReconcileSyncer::new(
        MongoColumnStore::new(context.column_db.clone()),
        MongoSearchIndex::new(context.index_db.clone()),
    );
    let report = syncer.sync_mapping(&mapping()).unwrap();
    assert_eq!(report.inserted_into_sink, 1);
    assert_eq!(report.inserted_into_source, 1);

    let synced = context
        .index_db
        .collection::<Document>("user")
        .find_one(doc! {"_id": ID1}, None)
        .unwrap()
        .unwrap();
    assert_eq!(synced.get_str("full_name").unwrap(), "a");
    assert_eq!(synced.get_i64("ts").unwrap(), 100);

    // second pass over the same data writes nothing.
    syncer.watermarks().clear();
    let report = syncer.sync_mapping(&mapping()).unwrap();
    assert_eq!(report.written(), 0);
}

#[test]
#[ignore = "requires running mongodb servers"]
fn test_search_index_window_matches_datetimes() {
    let context = Context::new();
    context
        .index_db
        .collection::<Document>("user")
        .insert_many(
            vec![
                doc! {"_id": ID1, "ts": bson::DateTime::from_millis(100_000), "full_name": "a"},
                doc! {"_id": ID2, "ts": bson::DateTime::from_millis(200_500), "full_name": "b"},
            ],
            None,
        )
        .unwrap();

    let index = MongoSearchIndex::new(context.index_db.clone());
    let windowed = index
        .search_summaries(mapping().sink(), Some(TimeWindow::new(150, 200)))
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].id, ID2);
    assert_eq!(windowed[0].timestamp, 200);
}

#[test]
#[ignore = "requires running mongodb servers"]
fn test_large_bulk_and_lookup() {
    let context = Context::new();
    let index = MongoSearchIndex::new(context.index_db.clone());
    let m = mapping();
    let ids: Vec<String> = (0..2500_u128).map(|i| Uuid::from_u128(i).to_string()).collect();
    let statements = ids
        .iter()
        .map(|id| WriteStatement {
            op: WriteOp::Insert,
            id: id.clone(),
            timestamp: 100,
            fields: doc! {"full_name": "x"},
        })
        .collect();

    let response = index.bulk(m.sink(), statements).unwrap();
    assert_eq!(response.succeeded, 2500);
    assert!(response.failed.is_empty());
    assert_eq!(index.fetch_by_ids(m.sink(), &ids).unwrap().len(), 2500);
}
