//! recon_sync configuration, express in toml.
//!
//! Basic configuration file example:
//! ```toml
//! [sync]
//! # seconds to wait between two reconcile passes.
//! interval = 60
//! # how many mappings are reconciled at the same time, 0 means number of cpus.
//! mapping_concurrent = 1
//!
//! [column_store]
//! url = "mongodb://localhost:27017"
//! database = "shop"
//!
//! [column_store.collections.users]
//! id = "id"
//! timestamp = "updated_at"
//! columns = ["name", "email"]
//!
//! [search_index]
//! url = "mongodb://localhost:27018"
//! database = "search"
//!
//! [search_index.collections.user]
//! id = "_id"
//! timestamp = "updated_at"
//! columns = ["full_name", "mail"]
//!
//! [[mappings]]
//! source = "users"
//! sink = "user"
//! ```
use crate::mapping::{CollectionSchema, Mapping};
use crate::{Result, SyncError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Global reconcile syncer configuration.
#[derive(Deserialize, Debug)]
pub struct SyncerConfig {
    #[serde(default)]
    sync: SyncConf,
    column_store: StoreConf,
    search_index: StoreConf,
    #[serde(default)]
    mappings: Vec<MappingConf>,
}

impl SyncerConfig {
    /// read and parse configuration from toml file `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<SyncerConfig> {
        let data = std::fs::read(path)?;
        Ok(toml::from_slice(&data)?)
    }

    /// parse configuration from toml text.
    pub fn from_toml(data: &str) -> Result<SyncerConfig> {
        Ok(toml::from_str(data)?)
    }

    /// get column store mongodb url.
    pub fn get_column_store_url(&self) -> &str {
        &self.column_store.url
    }

    /// get column store database name.
    pub fn get_column_store_db(&self) -> &str {
        &self.column_store.database
    }

    /// get search index mongodb url.
    pub fn get_search_index_url(&self) -> &str {
        &self.search_index.url
    }

    /// get search index database name.
    pub fn get_search_index_db(&self) -> &str {
        &self.search_index.database
    }

    /// get interval between two passes.
    pub fn get_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval)
    }

    /// get how many mappings are reconciled concurrently, always >= 1.
    pub fn get_mapping_concurrent(&self) -> usize {
        match self.sync.mapping_concurrent {
            0 => num_cpus::get(),
            n => n,
        }
    }

    /// Resolve and validate every configured mapping.
    ///
    /// It returns [SyncError::ConfigurationError] when a mapping refers to an undeclared
    /// collection, misses a key, or the two sides of a mapping don't have the same number of
    /// columns.
    pub fn get_mappings(&self) -> Result<Vec<Mapping>> {
        if self.sync.interval == 0 {
            return Err(SyncError::ConfigurationError(
                "sync interval must be greater than 0".to_string(),
            ));
        }
        if self.mappings.is_empty() {
            return Err(SyncError::ConfigurationError(
                "no mappings configured".to_string(),
            ));
        }

        self.mappings
            .iter()
            .map(|m| {
                let source = required(&m.source, "source", "mappings")?;
                let sink = required(&m.sink, "sink", "mappings")?;
                let source = self.column_store.schema(source)?;
                let sink = self.search_index.schema(sink)?;
                Mapping::new(source, sink)
            })
            .collect()
    }
}

/// Sync loop configuration.
#[derive(Deserialize, Debug)]
pub struct SyncConf {
    /// seconds between two passes.
    #[serde(default = "default_interval")]
    interval: u64,
    /// how many mappings are reconciled at the same time.
    #[serde(default = "default_mapping_concurrent")]
    mapping_concurrent: usize,
}

impl Default for SyncConf {
    fn default() -> Self {
        SyncConf {
            interval: default_interval(),
            mapping_concurrent: default_mapping_concurrent(),
        }
    }
}

/// One store endpoint and the collections declared on it.
#[derive(Deserialize, Debug)]
pub struct StoreConf {
    /// mongodb url, begins with 'mongodb://'
    url: String,
    /// database which holds the collections.
    database: String,
    #[serde(default)]
    collections: HashMap<String, CollectionConf>,
}

impl StoreConf {
    fn schema(&self, name: &str) -> Result<CollectionSchema> {
        let conf = self.collections.get(name).ok_or_else(|| {
            SyncError::ConfigurationError(format!(
                "collection {:?} is not declared for database {:?}",
                name, self.database
            ))
        })?;
        Ok(CollectionSchema::new(
            name,
            required(&conf.id, "id", name)?.as_str(),
            required(&conf.timestamp, "timestamp", name)?.as_str(),
            required(&conf.columns, "columns", name)?.clone(),
        ))
    }
}

/// Collection fields declaration.
///
/// Every key is required, they are optional here so a missing one is reported by
/// [SyncerConfig::get_mappings] as a configuration error.
#[derive(Deserialize, Debug)]
pub struct CollectionConf {
    /// field storing the record identifier.
    id: Option<String>,
    /// field storing the record last modified time.
    timestamp: Option<String>,
    /// data fields, positionally matched with the other side.
    columns: Option<Vec<String>>,
}

/// Pair one column store collection with one search index collection.
#[derive(Deserialize, Debug)]
pub struct MappingConf {
    source: Option<String>,
    sink: Option<String>,
}

fn required<'a, T>(value: &'a Option<T>, key: &str, section: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| {
        SyncError::ConfigurationError(format!("missing key {:?} in {:?}", key, section))
    })
}

fn default_interval() -> u64 {
    60
}

fn default_mapping_concurrent() -> usize {
    1
}
