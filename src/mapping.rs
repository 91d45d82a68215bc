//! Collection descriptors and the positional field mapping between a column store
//! collection (source) and a search index collection (sink).
use crate::{Result, SyncError};
use std::fmt;

/// Describes one collection on one side of a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    name: String,
    id_field: String,
    timestamp_field: String,
    data_fields: Vec<String>,
}

impl CollectionSchema {
    /// create a collection descriptor, data fields are kept in the given order.
    pub fn new(
        name: impl Into<String>,
        id_field: impl Into<String>,
        timestamp_field: impl Into<String>,
        data_fields: Vec<String>,
    ) -> Self {
        CollectionSchema {
            name: name.into(),
            id_field: id_field.into(),
            timestamp_field: timestamp_field.into(),
            data_fields,
        }
    }

    /// collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// field which saves record identifier.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// field which saves record last modified time.
    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    /// ordered data fields.
    pub fn data_fields(&self) -> &[String] {
        &self.data_fields
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SyncError::ConfigurationError(
                "collection name can't be empty".to_string(),
            ));
        }
        if self.id_field.is_empty() || self.timestamp_field.is_empty() {
            return Err(SyncError::ConfigurationError(format!(
                "collection {:?} must declare both id and timestamp field",
                self.name
            )));
        }
        if let Some(pos) = self.data_fields.iter().position(|f| f.is_empty()) {
            return Err(SyncError::ConfigurationError(format!(
                "collection {:?} has an empty data field at position {}",
                self.name, pos
            )));
        }
        Ok(())
    }
}

/// A validated pairing of one source collection and one sink collection.
///
/// Data field `i` of the source is written to data field `i` of the sink and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    source: CollectionSchema,
    sink: CollectionSchema,
}

impl Mapping {
    /// Validate and build a mapping.
    ///
    /// Returns [SyncError::ConfigurationError] when the two data field lists differ in length
    /// or a descriptor is incomplete.
    pub fn new(source: CollectionSchema, sink: CollectionSchema) -> Result<Mapping> {
        source.validate()?;
        sink.validate()?;
        if source.data_fields.len() != sink.data_fields.len() {
            return Err(SyncError::ConfigurationError(format!(
                "mapping {:?} -> {:?} has {} source fields but {} sink fields",
                source.name,
                sink.name,
                source.data_fields.len(),
                sink.data_fields.len()
            )));
        }
        Ok(Mapping { source, sink })
    }

    /// column store side.
    pub fn source(&self) -> &CollectionSchema {
        &self.source
    }

    /// search index side.
    pub fn sink(&self) -> &CollectionSchema {
        &self.sink
    }

    /// (source field, sink field) pairs in positional order.
    pub fn field_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.source
            .data_fields
            .iter()
            .zip(self.sink.data_fields.iter())
            .map(|(s, d)| (s.as_str(), d.as_str()))
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source.name, self.sink.name)
    }
}
