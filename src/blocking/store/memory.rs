//! In-memory stores with the same access contracts as the mongodb ones.
//!
//! All data is lost when the store is dropped. Every call is counted and each kind of call can
//! be made to fail, which makes them handy to drive the reconcile engine without servers.
use super::bson_helper;
use super::{BulkResponse, ColumnStore, SearchIndex};
use crate::mapping::CollectionSchema;
use crate::record::{FullRecord, RecordSummary, TimeWindow, WriteOp, WriteStatement};
use crate::{Result, SyncError};
use bson::{Bson, Document};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Kind of store call, used for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    /// summary scan or search.
    Summary,
    /// lookup by id list.
    Lookup,
    /// batch or bulk write.
    Write,
}

#[derive(Debug)]
struct Inner<K> {
    // collection name -> id -> stored document (timestamp and data fields).
    colls: HashMap<String, BTreeMap<K, Document>>,
    calls: HashMap<StoreCall, usize>,
    failing: HashSet<StoreCall>,
    rejected: HashSet<K>,
    windows: Vec<Option<TimeWindow>>,
}

impl<K> Default for Inner<K> {
    fn default() -> Self {
        Inner {
            colls: HashMap::new(),
            calls: HashMap::new(),
            failing: HashSet::new(),
            rejected: HashSet::new(),
            windows: vec![],
        }
    }
}

#[derive(Debug)]
struct MemoryCollections<K> {
    inner: Mutex<Inner<K>>,
}

impl<K: Ord + Clone + std::hash::Hash + Eq> MemoryCollections<K> {
    fn new() -> Self {
        MemoryCollections {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<K>>> {
        self.inner
            .lock()
            .map_err(|_| SyncError::StoreError("memory store lock poisoned".to_string()))
    }

    // count the call, and fail it when requested.
    fn enter(&self, call: StoreCall) -> Result<MutexGuard<'_, Inner<K>>> {
        let mut inner = self.lock()?;
        *inner.calls.entry(call).or_insert(0) += 1;
        if inner.failing.contains(&call) {
            return Err(SyncError::StoreError(format!("injected {:?} failure", call)));
        }
        Ok(inner)
    }

    fn put(&self, coll: &str, id: K, doc: Document) {
        if let Ok(mut inner) = self.lock() {
            inner
                .colls
                .entry(coll.to_string())
                .or_default()
                .insert(id, doc);
        }
    }

    fn get(&self, coll: &str, id: &K) -> Option<Document> {
        self.lock()
            .ok()
            .and_then(|inner| inner.colls.get(coll).and_then(|c| c.get(id).cloned()))
    }

    fn len(&self, coll: &str) -> usize {
        self.lock()
            .map(|inner| inner.colls.get(coll).map_or(0, |c| c.len()))
            .unwrap_or(0)
    }

    fn calls(&self, call: StoreCall) -> usize {
        self.lock()
            .map(|inner| inner.calls.get(&call).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn set_failing(&self, call: StoreCall, failing: bool) {
        if let Ok(mut inner) = self.lock() {
            if failing {
                inner.failing.insert(call);
            } else {
                inner.failing.remove(&call);
            }
        }
    }

    fn summaries(
        inner: &Inner<K>,
        schema: &CollectionSchema,
        window: Option<TimeWindow>,
    ) -> Result<Vec<RecordSummary<K>>> {
        let mut result = vec![];
        if let Some(coll) = inner.colls.get(schema.name()) {
            for (id, doc) in coll.iter() {
                let ts = bson_helper::get_epoch_secs(doc, schema.timestamp_field())?;
                if window.map_or(true, |w| w.contains(ts)) {
                    result.push(RecordSummary::new(id.clone(), ts));
                }
            }
        }
        Ok(result)
    }

    fn lookup(
        inner: &Inner<K>,
        schema: &CollectionSchema,
        ids: &[K],
    ) -> Result<Vec<FullRecord<K>>> {
        let mut result = vec![];
        if let Some(coll) = inner.colls.get(schema.name()) {
            for id in ids {
                if let Some(doc) = coll.get(id) {
                    result.push(FullRecord {
                        id: id.clone(),
                        timestamp: bson_helper::get_epoch_secs(doc, schema.timestamp_field())?,
                        values: bson_helper::get_values(doc, schema.data_fields()),
                    });
                }
            }
        }
        Ok(result)
    }

    fn write(inner: &mut Inner<K>, schema: &CollectionSchema, st: WriteStatement<K>) {
        let coll = inner.colls.entry(schema.name().to_string()).or_default();
        let ts_field = schema.timestamp_field();
        match st.op {
            WriteOp::Insert => {
                let mut doc = Document::new();
                doc.insert(ts_field, Bson::Int64(st.timestamp));
                for (k, v) in st.fields {
                    doc.insert(k, v);
                }
                coll.insert(st.id, doc);
            }
            WriteOp::Update => {
                if let Some(doc) = coll.get_mut(&st.id) {
                    doc.insert(ts_field, Bson::Int64(st.timestamp));
                    for (k, v) in st.fields {
                        doc.insert(k, v);
                    }
                }
            }
        }
    }
}

/// In-memory [ColumnStore].
#[derive(Debug)]
pub struct MemoryColumnStore {
    data: MemoryCollections<Uuid>,
}

impl MemoryColumnStore {
    /// Create a new empty column store.
    pub fn new() -> Self {
        MemoryColumnStore {
            data: MemoryCollections::new(),
        }
    }

    /// save a record, `fields` holds timestamp and data fields.
    pub fn put(&self, coll: &str, id: Uuid, fields: Document) {
        self.data.put(coll, id, fields)
    }

    /// get the stored record.
    pub fn get(&self, coll: &str, id: &Uuid) -> Option<Document> {
        self.data.get(coll, id)
    }

    /// number of records in `coll`.
    pub fn len(&self, coll: &str) -> usize {
        self.data.len(coll)
    }

    /// how many times the given kind of call was made.
    pub fn calls(&self, call: StoreCall) -> usize {
        self.data.calls(call)
    }

    /// make every following call of the given kind fail, or stop failing.
    pub fn set_failing(&self, call: StoreCall, failing: bool) {
        self.data.set_failing(call, failing)
    }
}

impl Default for MemoryColumnStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnStore for MemoryColumnStore {
    fn scan_summaries(&self, schema: &CollectionSchema) -> Result<Vec<RecordSummary<Uuid>>> {
        let inner = self.data.enter(StoreCall::Summary)?;
        MemoryCollections::summaries(&*inner, schema, None)
    }

    fn fetch_by_ids(
        &self,
        schema: &CollectionSchema,
        ids: &[Uuid],
    ) -> Result<Vec<FullRecord<Uuid>>> {
        let inner = self.data.enter(StoreCall::Lookup)?;
        MemoryCollections::lookup(&*inner, schema, ids)
    }

    fn execute_batch(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement<Uuid>>,
    ) -> Result<()> {
        let mut inner = self.data.enter(StoreCall::Write)?;
        for st in statements {
            MemoryCollections::write(&mut *inner, schema, st);
        }
        Ok(())
    }
}

/// In-memory [SearchIndex].
#[derive(Debug)]
pub struct MemorySearchIndex {
    data: MemoryCollections<String>,
}

impl MemorySearchIndex {
    /// Create a new empty search index.
    pub fn new() -> Self {
        MemorySearchIndex {
            data: MemoryCollections::new(),
        }
    }

    /// save a document, `fields` holds timestamp and data fields.
    pub fn put(&self, coll: &str, id: &str, fields: Document) {
        self.data.put(coll, id.to_string(), fields)
    }

    /// get the stored document.
    pub fn get(&self, coll: &str, id: &str) -> Option<Document> {
        self.data.get(coll, &id.to_string())
    }

    /// number of documents in `coll`.
    pub fn len(&self, coll: &str) -> usize {
        self.data.len(coll)
    }

    /// how many times the given kind of call was made.
    pub fn calls(&self, call: StoreCall) -> usize {
        self.data.calls(call)
    }

    /// make every following call of the given kind fail, or stop failing.
    pub fn set_failing(&self, call: StoreCall, failing: bool) {
        self.data.set_failing(call, failing)
    }

    /// reject bulk writes of the document `id`, other documents are still written.
    pub fn reject(&self, id: &str) {
        if let Ok(mut inner) = self.data.lock() {
            inner.rejected.insert(id.to_string());
        }
    }

    /// windows received by every summary search, in call order.
    pub fn windows(&self) -> Vec<Option<TimeWindow>> {
        self.data
            .lock()
            .map(|inner| inner.windows.clone())
            .unwrap_or_default()
    }
}

impl Default for MemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn search_summaries(
        &self,
        schema: &CollectionSchema,
        window: Option<TimeWindow>,
    ) -> Result<Vec<RecordSummary>> {
        let mut inner = self.data.enter(StoreCall::Summary)?;
        inner.windows.push(window);
        MemoryCollections::summaries(&*inner, schema, window)
    }

    fn fetch_by_ids(&self, schema: &CollectionSchema, ids: &[String]) -> Result<Vec<FullRecord>> {
        let inner = self.data.enter(StoreCall::Lookup)?;
        MemoryCollections::lookup(&*inner, schema, ids)
    }

    fn bulk(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement>,
    ) -> Result<BulkResponse> {
        let mut inner = self.data.enter(StoreCall::Write)?;
        let mut response = BulkResponse::default();
        for st in statements {
            if inner.rejected.contains(&st.id) {
                response.failed.push((st.id, "document rejected".to_string()));
                continue;
            }
            MemoryCollections::write(&mut *inner, schema, st);
            response.succeeded += 1;
        }
        Ok(response)
    }
}
