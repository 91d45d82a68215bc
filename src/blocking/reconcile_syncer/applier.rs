//! Write materialized records, one request per direction per pass.
use crate::blocking::store::{ColumnStore, SearchIndex};
use crate::mapping::CollectionSchema;
use crate::record::WriteStatement;
use crate::{Result, SyncError};
use tracing::{info, warn};
use uuid::Uuid;

/// Submit `statements` to the search index as one bulk write.
///
/// A rejected document fails the whole direction, the same as a failed request.
pub fn apply_to_sink<S: SearchIndex + ?Sized>(
    index: &S,
    schema: &CollectionSchema,
    statements: Vec<WriteStatement>,
) -> Result<usize> {
    if statements.is_empty() {
        return Ok(0);
    }
    let count = statements.len();
    let response = index
        .bulk(schema, statements)
        .map_err(|e| SyncError::apply(schema.name(), count, e))?;

    if !response.failed.is_empty() {
        for (id, reason) in response.failed.iter() {
            warn!(coll = schema.name(), %id, %reason, "Document rejected by bulk write.");
        }
        return Err(SyncError::ApplyError {
            collection: schema.name().to_string(),
            count,
            detail: format!(
                "{} of {} documents rejected",
                response.failed.len(),
                count
            ),
        });
    }
    info!(coll = schema.name(), count = response.succeeded, "Bulk write complete.");
    Ok(response.succeeded)
}

/// Execute `statements` against the column store as one batch.
pub fn apply_to_source<C: ColumnStore + ?Sized>(
    store: &C,
    schema: &CollectionSchema,
    statements: Vec<WriteStatement<Uuid>>,
) -> Result<usize> {
    if statements.is_empty() {
        return Ok(0);
    }
    let count = statements.len();
    store
        .execute_batch(schema, statements)
        .map_err(|e| SyncError::apply(schema.name(), count, e))?;
    info!(coll = schema.name(), count, "Batch statement complete.");
    Ok(count)
}
