use bson::document::ValueAccessError;
use mongodb::error::Error as MongoError;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Mongodb connection error")]
    MongoError(#[from] MongoError),
    #[error("Check permission for database {db:?} failed, connection string: {uri:?}, detailed: {detail:?}")]
    PermissionError {
        uri: String,
        db: String,
        detail: MongoError,
    },
    #[error("Bson value access error")]
    BsonError(#[from] ValueAccessError),
    #[error("Read configuration file failed")]
    IoError(#[from] std::io::Error),
    #[error("Parse configuration file failed")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),
    #[error("Identifier {id:?} is not a canonical uuid, detailed: {detail}")]
    MalformedIdentifier { id: String, detail: String },
    #[error("Fetch from collection {collection:?} failed, detailed: {detail}")]
    FetchError {
        collection: String,
        #[source]
        detail: Box<SyncError>,
    },
    #[error("Apply {count} records to collection {collection:?} failed, detailed: {detail}")]
    ApplyError {
        collection: String,
        count: usize,
        detail: String,
    },
    #[error("Store returned unexpected data: {0}")]
    StoreError(String),
    #[error("Sync pass failed for {} mapping(s)", .failures.len())]
    PassFailed { failures: Vec<(String, SyncError)> },
}

impl SyncError {
    /// wrap an error raised while reading summaries or records from `collection`.
    pub fn fetch(collection: &str, detail: SyncError) -> SyncError {
        match detail {
            // keep the innermost collection, don't wrap twice.
            e @ SyncError::FetchError { .. } => e,
            e => SyncError::FetchError {
                collection: collection.to_string(),
                detail: Box::new(e),
            },
        }
    }

    /// wrap an error raised while writing `count` records into `collection`.
    pub fn apply(collection: &str, count: usize, detail: SyncError) -> SyncError {
        match detail {
            e @ SyncError::ApplyError { .. } => e,
            e => SyncError::ApplyError {
                collection: collection.to_string(),
                count,
                detail: e.to_string(),
            },
        }
    }
}

pub type Result<T> = StdResult<T, SyncError>;
