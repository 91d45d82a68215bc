//! Record level types passed between the fetch, reconcile, materialize and apply steps.
use crate::{Result, SyncError};
use bson::{Bson, Document};
use uuid::Uuid;

/// Identifier and last modified time (seconds since epoch) of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary<I = String> {
    pub id: I,
    pub timestamp: i64,
}

impl<I> RecordSummary<I> {
    pub fn new(id: I, timestamp: i64) -> Self {
        RecordSummary { id, timestamp }
    }
}

/// A fully fetched record.
///
/// `values` follows the data field order of the collection it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct FullRecord<I = String> {
    pub id: I,
    pub timestamp: i64,
    pub values: Vec<Bson>,
}

/// Write kind of a statement, decided by the record's disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
}

/// One record write against a destination collection.
///
/// `fields` is keyed by the destination's data field names, it never contains the id field.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStatement<I = String> {
    pub op: WriteOp,
    pub id: I,
    pub timestamp: i64,
    pub fields: Document,
}

/// Inclusive time range `[start, end]` in seconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Convert a search index document id into the column store's uuid token.
///
/// Only the lower-case hyphenated form is accepted: it is the form [from_token] renders, so
/// every accepted id names the same record on both sides.
pub fn to_token(id: &str) -> Result<Uuid> {
    let token = Uuid::parse_str(id).map_err(|e| SyncError::MalformedIdentifier {
        id: id.to_string(),
        detail: e.to_string(),
    })?;
    if from_token(&token) != id {
        return Err(SyncError::MalformedIdentifier {
            id: id.to_string(),
            detail: format!("expect {:?}", from_token(&token)),
        });
    }
    Ok(token)
}

/// Render a column store token as a search index document id.
pub fn from_token(token: &Uuid) -> String {
    token.to_hyphenated().to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_window_inclusive() {
        let window = TimeWindow::new(10, 20);
        assert!(window.contains(10));
        assert!(window.contains(20));
        assert!(!window.contains(9));
        assert!(!window.contains(21));
    }

    #[test]
    fn test_token_conversion() {
        let token = to_token("c050283e-3641-4d79-8e82-6665b7a4d19b").unwrap();
        assert_eq!(from_token(&token), "c050283e-3641-4d79-8e82-6665b7a4d19b");
    }

    #[test]
    fn test_non_canonical_token_rejected() {
        for id in [
            "C050283E-3641-4D79-8E82-6665B7A4D19B",
            "c050283e36414d798e826665b7a4d19b",
            "urn:uuid:c050283e-3641-4d79-8e82-6665b7a4d19b",
        ] {
            match to_token(id) {
                Err(SyncError::MalformedIdentifier { id: bad, .. }) => assert_eq!(bad, id),
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[test]
    fn test_malformed_token() {
        match to_token("not-a-uuid") {
            Err(SyncError::MalformedIdentifier { id, .. }) => assert_eq!(id, "not-a-uuid"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
