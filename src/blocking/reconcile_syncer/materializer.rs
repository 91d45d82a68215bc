//! Fetch full records for identifiers that need to be propagated, and rename their fields to
//! the destination's schema.
use crate::blocking::store::{ColumnStore, SearchIndex};
use crate::mapping::Mapping;
use crate::record::{from_token, to_token, WriteOp, WriteStatement};
use crate::{Result, SyncError};
use bson::{Bson, Document};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Put `values` under `dest_fields`, position by position.
pub fn remap(values: Vec<Bson>, dest_fields: &[String]) -> Document {
    dest_fields.iter().cloned().zip(values).collect()
}

fn write_ops<'a>(inserts: &'a [String], updates: &'a [String]) -> HashMap<&'a str, WriteOp> {
    inserts
        .iter()
        .map(|id| (id.as_str(), WriteOp::Insert))
        .chain(updates.iter().map(|id| (id.as_str(), WriteOp::Update)))
        .collect()
}

/// Build search index writes for column store records `inserts` and `updates`.
pub fn materialize_for_sink<C: ColumnStore + ?Sized>(
    store: &C,
    mapping: &Mapping,
    inserts: &[String],
    updates: &[String],
) -> Result<Vec<WriteStatement>> {
    let (source, sink) = (mapping.source(), mapping.sink());
    let ops = write_ops(inserts, updates);
    // ids go to the lookup as typed tokens, never as raw text.
    let tokens = inserts
        .iter()
        .chain(updates.iter())
        .map(String::as_str)
        .map(to_token)
        .collect::<Result<Vec<Uuid>>>()?;

    let records = store
        .fetch_by_ids(source, &tokens)
        .map_err(|e| SyncError::fetch(source.name(), e))?;

    let mut statements = Vec::with_capacity(records.len());
    for record in records {
        let id = from_token(&record.id);
        let op = match ops.get(id.as_str()) {
            Some(op) => *op,
            None => {
                warn!(
                    %id,
                    coll = source.name(),
                    "Lookup returned an id which is not requested, ignored."
                );
                continue;
            }
        };
        statements.push(WriteStatement {
            op,
            id,
            timestamp: record.timestamp,
            fields: remap(record.values, sink.data_fields()),
        });
    }
    warn_missing(mapping, source.name(), ops.len(), statements.len());
    Ok(statements)
}

/// Build column store writes for search index documents `inserts` and `updates`.
///
/// Every id must be a valid uuid, or [SyncError::MalformedIdentifier] is returned before anything
/// is fetched.
pub fn materialize_for_source<S: SearchIndex + ?Sized>(
    index: &S,
    mapping: &Mapping,
    inserts: &[String],
    updates: &[String],
) -> Result<Vec<WriteStatement<Uuid>>> {
    let (source, sink) = (mapping.source(), mapping.sink());
    let ops = write_ops(inserts, updates);
    let mut tokens: HashMap<&str, Uuid> = HashMap::with_capacity(ops.len());
    for id in ops.keys() {
        tokens.insert(*id, to_token(id)?);
    }

    let ids: Vec<String> = inserts.iter().chain(updates.iter()).cloned().collect();
    let records = index
        .fetch_by_ids(sink, &ids)
        .map_err(|e| SyncError::fetch(sink.name(), e))?;

    let mut statements = Vec::with_capacity(records.len());
    for record in records {
        let (op, token) = match (ops.get(record.id.as_str()), tokens.get(record.id.as_str())) {
            (Some(op), Some(token)) => (*op, *token),
            _ => {
                warn!(
                    id = %record.id,
                    coll = sink.name(),
                    "Lookup returned an id which is not requested, ignored."
                );
                continue;
            }
        };
        statements.push(WriteStatement {
            op,
            id: token,
            timestamp: record.timestamp,
            fields: remap(record.values, source.data_fields()),
        });
    }
    warn_missing(mapping, sink.name(), ops.len(), statements.len());
    Ok(statements)
}

// records may be gone between summary fetch and lookup, they are picked up by next pass.
fn warn_missing(mapping: &Mapping, coll: &str, requested: usize, found: usize) {
    if found < requested {
        warn!(
            %mapping,
            %coll,
            requested,
            found,
            "Some records disappeared before they could be fetched."
        );
    }
}
