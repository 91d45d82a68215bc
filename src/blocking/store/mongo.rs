//! Mongodb backed stores.
//!
//! [MongoColumnStore] keeps the primary key only contract: it never asks the server to filter
//! by timestamp, summaries always come from a full projection scan.
use super::bson_helper;
use super::{BulkResponse, ColumnStore, SearchIndex};
use crate::mapping::CollectionSchema;
use crate::record::{FullRecord, RecordSummary, TimeWindow, WriteOp, WriteStatement};
use crate::{Result, SyncError};
use bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use mongodb::sync::{Collection, Database};
use tracing::{debug, warn};
use uuid::Uuid;

const BATCH_SIZE: u32 = 10000;
// one wire command holds at most this many statements or ids.
const WRITE_BATCH_SIZE: usize = 1000;
const LOOKUP_BATCH_SIZE: usize = 1000;
// keep one command well below the server's 16MB message limit.
const WRITE_BATCH_BYTES: usize = 8 * 1024 * 1024;

/// Column store living in a mongodb database, records are keyed by uuid binaries.
#[derive(Clone, Debug)]
pub struct MongoColumnStore {
    db: Database,
}

impl MongoColumnStore {
    /// create a column store on top of `db`.
    pub fn new(db: Database) -> Self {
        MongoColumnStore { db }
    }

    fn coll(&self, schema: &CollectionSchema) -> Collection<Document> {
        self.db.collection(schema.name())
    }

    fn to_full_record(schema: &CollectionSchema, doc: &Document) -> Result<FullRecord<Uuid>> {
        Ok(FullRecord {
            id: bson_helper::get_uuid(doc, schema.id_field())?,
            timestamp: bson_helper::get_epoch_secs(doc, schema.timestamp_field())?,
            values: bson_helper::get_values(doc, schema.data_fields()),
        })
    }
}

impl ColumnStore for MongoColumnStore {
    fn scan_summaries(&self, schema: &CollectionSchema) -> Result<Vec<RecordSummary<Uuid>>> {
        let (id_field, ts_field) = (schema.id_field(), schema.timestamp_field());
        let cursor = self.coll(schema).find(
            None,
            FindOptions::builder()
                .projection(doc! {id_field: 1, ts_field: 1})
                .batch_size(BATCH_SIZE)
                .build(),
        )?;

        let mut result = vec![];
        for doc in cursor {
            let doc = doc?;
            result.push(RecordSummary::new(
                bson_helper::get_uuid(&doc, id_field)?,
                bson_helper::get_epoch_secs(&doc, ts_field)?,
            ));
        }
        Ok(result)
    }

    fn fetch_by_ids(
        &self,
        schema: &CollectionSchema,
        ids: &[Uuid],
    ) -> Result<Vec<FullRecord<Uuid>>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let id_field = schema.id_field();
        let mut result = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LOOKUP_BATCH_SIZE) {
            let tokens: Vec<Bson> = chunk
                .iter()
                .map(|id| Bson::Binary(bson_helper::new_binary(*id)))
                .collect();
            let cursor = self.coll(schema).find(
                doc! {id_field: {"$in": tokens}},
                FindOptions::builder()
                    .projection(projection(schema))
                    .batch_size(BATCH_SIZE)
                    .build(),
            )?;
            for doc in cursor {
                result.push(Self::to_full_record(schema, &doc?)?);
            }
        }
        Ok(result)
    }

    fn execute_batch(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement<Uuid>>,
    ) -> Result<()> {
        let (id_field, ts_field) = (schema.id_field(), schema.timestamp_field());
        let statement_docs: Vec<Document> = statements
            .into_iter()
            .map(|st| {
                let id = bson_helper::new_binary(st.id);
                let ts = bson_helper::to_datetime(st.timestamp);
                update_statement(st.op, id_field, id.into(), ts_field, ts.into(), st.fields)
            })
            .collect();

        // ordered, stop at the first wire batch with a rejected statement.
        let mut offset = 0;
        for batch in into_write_batches(statement_docs) {
            let count = batch.len();
            let result = run_update_command(&self.db, schema.name(), batch, true)?;
            let errors = write_errors(&result, offset);
            if !errors.is_empty() {
                return Err(SyncError::StoreError(format!(
                    "batch against {:?} rejected: {:?}",
                    schema.name(),
                    errors
                )));
            }
            offset += count;
        }
        Ok(())
    }
}

/// Document index living in a mongodb database, documents are keyed by string ids.
#[derive(Clone, Debug)]
pub struct MongoSearchIndex {
    db: Database,
}

impl MongoSearchIndex {
    /// create a search index on top of `db`.
    pub fn new(db: Database) -> Self {
        MongoSearchIndex { db }
    }

    fn coll(&self, schema: &CollectionSchema) -> Collection<Document> {
        self.db.collection(schema.name())
    }
}

impl SearchIndex for MongoSearchIndex {
    fn search_summaries(
        &self,
        schema: &CollectionSchema,
        window: Option<TimeWindow>,
    ) -> Result<Vec<RecordSummary>> {
        let (id_field, ts_field) = (schema.id_field(), schema.timestamp_field());
        let cursor = self.coll(schema).find(
            window.map(|w| window_filter(ts_field, w)),
            FindOptions::builder()
                .projection(doc! {id_field: 1, ts_field: 1})
                .batch_size(BATCH_SIZE)
                .build(),
        )?;

        let mut result = vec![];
        for doc in cursor {
            let doc = doc?;
            result.push(RecordSummary::new(
                bson_helper::get_id_string(&doc, id_field)?,
                bson_helper::get_range_epoch_secs(&doc, ts_field)?,
            ));
        }
        Ok(result)
    }

    fn fetch_by_ids(&self, schema: &CollectionSchema, ids: &[String]) -> Result<Vec<FullRecord>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let id_field = schema.id_field();
        let mut result = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LOOKUP_BATCH_SIZE) {
            let cursor = self.coll(schema).find(
                doc! {id_field: {"$in": chunk.to_vec()}},
                FindOptions::builder()
                    .projection(projection(schema))
                    .batch_size(BATCH_SIZE)
                    .build(),
            )?;
            for doc in cursor {
                let doc = doc?;
                result.push(FullRecord {
                    id: bson_helper::get_id_string(&doc, id_field)?,
                    timestamp: bson_helper::get_epoch_secs(&doc, schema.timestamp_field())?,
                    values: bson_helper::get_values(&doc, schema.data_fields()),
                });
            }
        }
        Ok(result)
    }

    fn bulk(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement>,
    ) -> Result<BulkResponse> {
        let (id_field, ts_field) = (schema.id_field(), schema.timestamp_field());
        let ids: Vec<String> = statements.iter().map(|st| st.id.clone()).collect();
        let statement_docs: Vec<Document> = statements
            .into_iter()
            .map(|st| {
                update_statement(
                    st.op,
                    id_field,
                    st.id.into(),
                    ts_field,
                    st.timestamp.into(),
                    st.fields,
                )
            })
            .collect();

        // unordered, so one rejected document doesn't stop the others.
        let mut response = BulkResponse {
            succeeded: ids.len(),
            failed: vec![],
        };
        let mut offset = 0;
        for batch in into_write_batches(statement_docs) {
            let count = batch.len();
            let result = run_update_command(&self.db, schema.name(), batch, false)?;
            for (idx, reason) in write_errors(&result, offset) {
                let id = idx.and_then(|i| ids.get(i).cloned()).unwrap_or_default();
                response.failed.push((id, reason));
            }
            offset += count;
        }
        response.succeeded -= response.failed.len().min(response.succeeded);
        Ok(response)
    }
}

// numeric timestamps and datetimes are bracketed apart by the server, so both ranges are asked for.
// the bounds mirror the flooring done by `get_epoch_secs`: `start <= secs < end + 1`.
fn window_filter(ts_field: &str, window: TimeWindow) -> Document {
    let end = window.end.saturating_add(1);
    let (start_dt, end_dt) = (
        bson_helper::to_datetime(window.start),
        bson_helper::to_datetime(end),
    );
    doc! {
        "$or": [
            {ts_field: {"$gte": window.start, "$lt": end}},
            {ts_field: {"$gte": start_dt, "$lt": end_dt}},
        ]
    }
}

// split update statements into wire batches bounded by count and encoded size.
fn into_write_batches(statements: Vec<Document>) -> Vec<Vec<Document>> {
    let mut batches = vec![];
    let mut current: Vec<Document> = vec![];
    let mut bytes = 0;
    for st in statements {
        let size = bson::to_vec(&st).map(|b| b.len()).unwrap_or(0);
        if !current.is_empty()
            && (current.len() >= WRITE_BATCH_SIZE || bytes + size > WRITE_BATCH_BYTES)
        {
            batches.push(std::mem::take(&mut current));
            bytes = 0;
        }
        bytes += size;
        current.push(st);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

// (statement index in the whole submission, reason) of every write error in `result`.
fn write_errors(result: &Document, offset: usize) -> Vec<(Option<usize>, String)> {
    let errors = match result.get_array("writeErrors") {
        Ok(errors) => errors,
        Err(_) => return vec![],
    };
    let mut found = vec![];
    for err in errors {
        let err = match err {
            Bson::Document(d) => d,
            other => {
                warn!(?other, "unknown write error item, ignored.");
                continue;
            }
        };
        let idx = err
            .get_i32("index")
            .ok()
            .and_then(|i| usize::try_from(i).ok())
            .map(|i| offset + i);
        let reason = err.get_str("errmsg").unwrap_or("unknown error").to_string();
        found.push((idx, reason));
    }
    found
}

fn projection(schema: &CollectionSchema) -> Document {
    let (id_field, ts_field) = (schema.id_field(), schema.timestamp_field());
    let mut projection = doc! {id_field: 1, ts_field: 1};
    for f in schema.data_fields() {
        projection.insert(f.as_str(), 1);
    }
    projection
}

// inserts are converted to upsert `update` statements, so replaying them is idempotent.
// updates only `$set` timestamp and data fields, the id field is used as query only.
fn update_statement(
    op: WriteOp,
    id_field: &str,
    id: Bson,
    ts_field: &str,
    ts: Bson,
    fields: Document,
) -> Document {
    match op {
        WriteOp::Insert => {
            let mut replacement = doc! {id_field: id.clone(), ts_field: ts};
            for (k, v) in fields {
                replacement.insert(k, v);
            }
            doc! {"q": {id_field: id}, "u": replacement, "upsert": true}
        }
        WriteOp::Update => {
            let mut to_set = doc! {ts_field: ts};
            for (k, v) in fields {
                to_set.insert(k, v);
            }
            doc! {"q": {id_field: id}, "u": {"$set": to_set}, "upsert": false}
        }
    }
}

// for more information about update command:
// https://docs.mongodb.com/manual/reference/command/update/
fn run_update_command(
    db: &Database,
    coll_name: &str,
    statements: Vec<Document>,
    ordered: bool,
) -> Result<Document> {
    debug!(%coll_name, count = statements.len(), ordered, "Run update command.");
    let result = db.run_command(
        doc! {
            "update": coll_name,
            "updates": statements,
            "ordered": ordered,
        },
        None,
    )?;
    Ok(result)
}
