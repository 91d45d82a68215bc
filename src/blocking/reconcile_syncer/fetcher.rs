//! Read (id, timestamp) summaries of both sides.
use crate::blocking::store::{ColumnStore, SearchIndex};
use crate::mapping::CollectionSchema;
use crate::record::{from_token, RecordSummary, TimeWindow};
use crate::{Result, SyncError};
use tracing::debug;

/// Fetch summaries of a column store collection.
///
/// The column store can't filter by timestamp, so the whole collection is scanned and `window`
/// is applied here, on the client. This costs a full scan on every pass, windowing only bounds
/// how many records go into reconciliation.
pub fn fetch_source_summaries<C: ColumnStore + ?Sized>(
    store: &C,
    schema: &CollectionSchema,
    window: Option<TimeWindow>,
) -> Result<Vec<RecordSummary>> {
    let scanned = store
        .scan_summaries(schema)
        .map_err(|e| SyncError::fetch(schema.name(), e))?;
    let total = scanned.len();
    let summaries: Vec<RecordSummary> = scanned
        .into_iter()
        .filter(|s| window.map_or(true, |w| w.contains(s.timestamp)))
        .map(|s| RecordSummary::new(from_token(&s.id), s.timestamp))
        .collect();
    debug!(
        coll = schema.name(),
        total,
        kept = summaries.len(),
        ?window,
        "Scanned column store summaries."
    );
    Ok(summaries)
}

/// Fetch summaries of a search index collection, `window` is evaluated by the index.
pub fn fetch_sink_summaries<S: SearchIndex + ?Sized>(
    index: &S,
    schema: &CollectionSchema,
    window: Option<TimeWindow>,
) -> Result<Vec<RecordSummary>> {
    let summaries = index
        .search_summaries(schema, window)
        .map_err(|e| SyncError::fetch(schema.name(), e))?;
    debug!(coll = schema.name(), total = summaries.len(), ?window, "Searched index summaries.");
    Ok(summaries)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocking::store::memory::{MemoryColumnStore, MemorySearchIndex, StoreCall};
    use bson::doc;
    use uuid::Uuid;

    const ID1: &str = "c050283e-3641-4d79-8e82-6665b7a4d19b";
    const ID2: &str = "5a0c9a6c-5f3b-4d8e-9f0e-2b1a7c3d4e5f";

    fn schema() -> CollectionSchema {
        CollectionSchema::new("users", "id", "ts", vec!["name".to_string()])
    }

    #[test]
    fn test_source_window_applied_on_client() {
        let store = MemoryColumnStore::new();
        store.put("users", Uuid::parse_str(ID1).unwrap(), doc! {"ts": 100_i64, "name": "a"});
        store.put("users", Uuid::parse_str(ID2).unwrap(), doc! {"ts": 200_i64, "name": "b"});

        let all = fetch_source_summaries(&store, &schema(), None).unwrap();
        assert_eq!(all.len(), 2);

        let windowed =
            fetch_source_summaries(&store, &schema(), Some(TimeWindow::new(150, 250))).unwrap();
        assert_eq!(windowed, vec![RecordSummary::new(ID2.to_string(), 200)]);
    }

    #[test]
    fn test_sink_window_passed_to_index() {
        let index = MemorySearchIndex::new();
        index.put("users", "a", doc! {"ts": 100_i64});
        let window = Some(TimeWindow::new(150, 250));
        assert!(fetch_sink_summaries(&index, &schema(), window)
            .unwrap()
            .is_empty());
        assert_eq!(index.windows(), vec![window]);
    }

    #[test]
    fn test_fetch_error() {
        let index = MemorySearchIndex::new();
        index.set_failing(StoreCall::Summary, true);
        match fetch_sink_summaries(&index, &schema(), None) {
            Err(SyncError::FetchError { collection, .. }) => assert_eq!(collection, "users"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
