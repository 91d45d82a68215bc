/// provide reconcile sync blocking apis.
mod connection;
#[doc(hidden)]
pub mod reconcile_syncer;
#[doc(hidden)]
pub mod store;

pub use connection::Connection;
pub use reconcile_syncer::{MappingReport, PassReport, ReconcileSyncer};
pub use store::{ColumnStore, MongoColumnStore, MongoSearchIndex, SearchIndex};
