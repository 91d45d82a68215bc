//! Store access contracts used by the reconcile engine.
//!
//! The two traits deliberately expose different query surfaces: a [ColumnStore] can only be
//! scanned fully or looked up by primary key, a [SearchIndex] can filter by time range on the
//! server side.
#[doc(hidden)]
pub mod bson_helper;
pub mod memory;
pub mod mongo;

use crate::mapping::CollectionSchema;
use crate::record::{FullRecord, RecordSummary, TimeWindow, WriteStatement};
use crate::Result;
use uuid::Uuid;

pub use memory::{MemoryColumnStore, MemorySearchIndex};
pub use mongo::{MongoColumnStore, MongoSearchIndex};

/// Primary key addressed store, records are keyed by uuid tokens.
pub trait ColumnStore {
    /// Read (id, timestamp) of every record in the collection.
    ///
    /// The store can't filter by a non-key column, so this is always a full scan.
    fn scan_summaries(&self, schema: &CollectionSchema) -> Result<Vec<RecordSummary<Uuid>>>;

    /// Fetch full records for given primary keys in one lookup.
    fn fetch_by_ids(
        &self,
        schema: &CollectionSchema,
        ids: &[Uuid],
    ) -> Result<Vec<FullRecord<Uuid>>>;

    /// Execute `statements` as one batch, all or nothing from the caller's view.
    fn execute_batch(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement<Uuid>>,
    ) -> Result<()>;
}

/// Per record outcome of a bulk write.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkResponse {
    /// how many statements are applied.
    pub succeeded: usize,
    /// (document id, reason) for every rejected statement.
    pub failed: Vec<(String, String)>,
}

/// Range queryable document index, documents are keyed by their native string id.
pub trait SearchIndex {
    /// Read (id, timestamp) of documents, filtered by `window` on the server when given.
    fn search_summaries(
        &self,
        schema: &CollectionSchema,
        window: Option<TimeWindow>,
    ) -> Result<Vec<RecordSummary>>;

    /// Fetch documents by id, selecting the collection's data fields and timestamp field.
    fn fetch_by_ids(&self, schema: &CollectionSchema, ids: &[String]) -> Result<Vec<FullRecord>>;

    /// Submit `statements` in one bulk request.
    ///
    /// An `Err` means the request itself failed, rejected statements are reported in
    /// [BulkResponse].
    fn bulk(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement>,
    ) -> Result<BulkResponse>;
}

impl<T: ColumnStore + ?Sized> ColumnStore for &T {
    fn scan_summaries(&self, schema: &CollectionSchema) -> Result<Vec<RecordSummary<Uuid>>> {
        (**self).scan_summaries(schema)
    }

    fn fetch_by_ids(
        &self,
        schema: &CollectionSchema,
        ids: &[Uuid],
    ) -> Result<Vec<FullRecord<Uuid>>> {
        (**self).fetch_by_ids(schema, ids)
    }

    fn execute_batch(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement<Uuid>>,
    ) -> Result<()> {
        (**self).execute_batch(schema, statements)
    }
}

impl<T: SearchIndex + ?Sized> SearchIndex for &T {
    fn search_summaries(
        &self,
        schema: &CollectionSchema,
        window: Option<TimeWindow>,
    ) -> Result<Vec<RecordSummary>> {
        (**self).search_summaries(schema, window)
    }

    fn fetch_by_ids(&self, schema: &CollectionSchema, ids: &[String]) -> Result<Vec<FullRecord>> {
        (**self).fetch_by_ids(schema, ids)
    }

    fn bulk(
        &self,
        schema: &CollectionSchema,
        statements: Vec<WriteStatement>,
    ) -> Result<BulkResponse> {
        (**self).bulk(schema, statements)
    }
}
