use crate::blocking::store::{MongoColumnStore, MongoSearchIndex};
use crate::config::SyncerConfig;
use crate::error::{Result, SyncError};
use mongodb::sync::{Client, Database};

/// A simple abstraction for reconcile syncer connections.
#[derive(Clone)]
pub struct Connection<'a> {
    column_conn: Client,
    index_conn: Client,
    config: &'a SyncerConfig,
}

impl<'a> Connection<'a> {
    /// create a new connection from given `config`.
    pub fn new(config: &'a SyncerConfig) -> Result<Connection<'a>> {
        let column_conn = Client::with_uri_str(config.get_column_store_url())?;
        let index_conn = Client::with_uri_str(config.get_search_index_url())?;
        Ok(Connection {
            column_conn,
            index_conn,
            config,
        })
    }

    /// Check if we have enough permissions to read both databases.
    pub fn check_permissions(&self) -> Result<()> {
        let checks = [
            (
                self.get_column_db(),
                self.config.get_column_store_url(),
                self.config.get_column_store_db(),
            ),
            (
                self.get_index_db(),
                self.config.get_search_index_url(),
                self.config.get_search_index_db(),
            ),
        ];
        for (db, uri, db_name) in checks.iter() {
            if let Err(e) = db.list_collection_names(None) {
                return Err(SyncError::PermissionError {
                    uri: uri.to_string(),
                    db: db_name.to_string(),
                    detail: e,
                });
            }
        }
        Ok(())
    }

    /// get column store database.
    pub fn get_column_db(&self) -> Database {
        self.column_conn.database(self.config.get_column_store_db())
    }

    /// get search index database.
    pub fn get_index_db(&self) -> Database {
        self.index_conn.database(self.config.get_search_index_db())
    }

    /// column store backed by the configured database.
    pub fn column_store(&self) -> MongoColumnStore {
        MongoColumnStore::new(self.get_column_db())
    }

    /// search index backed by the configured database.
    pub fn search_index(&self) -> MongoSearchIndex {
        MongoSearchIndex::new(self.get_index_db())
    }

    /// get sync configuration.
    pub fn get_conf(&self) -> &SyncerConfig {
        self.config
    }
}
