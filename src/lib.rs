//! Reconcile sync lib, which keeps a primary key column store and a range queryable search index
//! converged, in both directions.
//!
//! Every pass reads (id, last modified time) summaries of both collections of a [Mapping],
//! classifies each id with a newer-timestamp-wins rule, fetches the records which need to be
//! propagated and writes them with one batched request per direction.
//!
//! The column store can only be scanned fully or looked up by primary key, so its summaries are
//! windowed on the client; the search index filters by time range itself.  Windows start at the
//! previous scan of the same collection, which is only remembered for the process lifetime.
//!
//! Deleted records are not recognized: a record missing on one side is copied back from the other.
//!
//! # ReconcileSyncer example:
//! ```no_run
//! use recon_sync::{Connection, ReconcileSyncer, SyncerConfig};
//!
//! let conf = SyncerConfig::from_file("config.toml").unwrap();
//! let syncer = ReconcileSyncer::from_config(&conf, || {
//!     let conn = Connection::new(&conf)?;
//!     Ok((conn.column_store(), conn.search_index()))
//! })
//! .unwrap();
//! loop {
//!     if let Err(e) = syncer.sync_configured() {
//!         eprintln!("{}", e);
//!     }
//!     std::thread::sleep(conf.get_interval());
//! }
//! ```

#![warn(missing_docs)]

#[doc(hidden)]
pub mod blocking;
mod config;
mod error;
#[allow(missing_docs)]
pub mod mapping;
#[allow(missing_docs)]
pub mod record;

pub use blocking::{
    ColumnStore, Connection, MappingReport, MongoColumnStore, MongoSearchIndex, PassReport,
    ReconcileSyncer, SearchIndex,
};
pub use config::SyncerConfig;
pub use error::{Result, SyncError};
pub use mapping::{CollectionSchema, Mapping};
