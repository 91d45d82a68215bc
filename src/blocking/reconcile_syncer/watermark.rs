//! Process lifetime scan watermarks.
//!
//! Nothing is persisted, a restart forgets every watermark and the next pass scans everything.
use crate::mapping::Mapping;
use crate::record::TimeWindow;
use std::collections::HashMap;
use std::sync::Mutex;

/// Which store a collection lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    ColumnStore,
    SearchIndex,
}

/// Identify one scanned collection.
///
/// Keys are scoped by mapping, two mappings reading the same collection keep their own windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatermarkKey {
    mapping: String,
    side: Side,
    collection: String,
}

impl WatermarkKey {
    pub fn new(mapping: &Mapping, side: Side) -> Self {
        let collection = match side {
            Side::ColumnStore => mapping.source().name(),
            Side::SearchIndex => mapping.sink().name(),
        };
        WatermarkKey {
            mapping: mapping.to_string(),
            side,
            collection: collection.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Last scan time for every collection scanned by this process.
#[derive(Debug, Default)]
pub struct WatermarkStore {
    marks: Mutex<HashMap<WatermarkKey, i64>>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// get last scan time of `key`, None if it was never scanned.
    pub fn get(&self, key: &WatermarkKey) -> Option<i64> {
        self.marks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
    }

    /// Window to scan at `now`, which is `[last watermark, now]`.
    ///
    /// Returns None when `key` was never scanned, which means a full scan is needed.
    pub fn window(&self, key: &WatermarkKey, now: i64) -> Option<TimeWindow> {
        self.get(key)
            .map(|last| TimeWindow::new(last, now.max(last)))
    }

    /// Record a successful scan at `now`, watermarks never go backwards.
    ///
    /// Returns the stored watermark.
    pub fn advance(&self, key: &WatermarkKey, now: i64) -> i64 {
        let mut marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
        let mark = marks.entry(key.clone()).or_insert(now);
        *mark = (*mark).max(now);
        *mark
    }

    /// forget every watermark, next passes will scan everything.
    pub fn clear(&self) {
        self.marks.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mapping::CollectionSchema;

    fn mapping(source: &str, sink: &str) -> Mapping {
        Mapping::new(
            CollectionSchema::new(source, "id", "ts", vec!["a".to_string()]),
            CollectionSchema::new(sink, "_id", "ts", vec!["b".to_string()]),
        )
        .unwrap()
    }

    #[test]
    fn test_first_scan_has_no_window() {
        let store = WatermarkStore::new();
        let key = WatermarkKey::new(&mapping("users", "user"), Side::ColumnStore);
        assert_eq!(store.window(&key, 100), None);
        store.advance(&key, 100);
        assert_eq!(store.window(&key, 150), Some(TimeWindow::new(100, 150)));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let store = WatermarkStore::new();
        let key = WatermarkKey::new(&mapping("users", "user"), Side::SearchIndex);
        assert_eq!(store.advance(&key, 100), 100);
        assert_eq!(store.advance(&key, 90), 100);
        assert_eq!(store.advance(&key, 120), 120);
        // clock went backwards, window is collapsed to the watermark.
        assert_eq!(store.window(&key, 110), Some(TimeWindow::new(120, 120)));
    }

    #[test]
    fn test_keys_are_disjoint() {
        let store = WatermarkStore::new();
        let m1 = mapping("users", "user");
        let m2 = mapping("users", "user_v2");
        store.advance(&WatermarkKey::new(&m1, Side::ColumnStore), 100);
        assert_eq!(store.get(&WatermarkKey::new(&m2, Side::ColumnStore)), None);
        assert_eq!(store.get(&WatermarkKey::new(&m1, Side::SearchIndex)), None);
        store.clear();
        assert_eq!(store.get(&WatermarkKey::new(&m1, Side::ColumnStore)), None);
    }
}
