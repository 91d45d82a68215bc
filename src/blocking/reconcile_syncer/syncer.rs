use super::time_helper::{self, Clock, SystemClock};
use super::watermark::{Side, WatermarkKey, WatermarkStore};
use super::{applier, fetcher, materializer, reconciler};
use crate::blocking::store::{ColumnStore, SearchIndex};
use crate::config::SyncerConfig;
use crate::mapping::Mapping;
use crate::record::{WriteOp, WriteStatement};
use crate::{Result, SyncError};
use crossbeam::channel;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{error, info};

/// What one mapping pass wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MappingReport {
    pub mapping: String,
    pub inserted_into_sink: usize,
    pub updated_sink: usize,
    pub inserted_into_source: usize,
    pub updated_source: usize,
    pub unchanged: usize,
}

impl MappingReport {
    /// total records written in both directions.
    pub fn written(&self) -> usize {
        self.inserted_into_sink
            + self.updated_sink
            + self.inserted_into_source
            + self.updated_source
    }
}

/// Reports of every mapping in one pass, in configuration order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub mappings: Vec<MappingReport>,
}

enum MappingStatus {
    Done(usize, MappingReport),
    Failed(usize, String, SyncError),
}

/// Reconcile configured mappings between a column store and a search index.
///
/// The syncer owns the watermarks, so it should live as long as the process polls.
pub struct ReconcileSyncer<C, S> {
    column: C,
    index: S,
    watermarks: WatermarkStore,
    clock: Arc<dyn Clock>,
    pool: Option<ThreadPool>,
    mappings: Vec<Mapping>,
}

impl<C, S> ReconcileSyncer<C, S>
where
    C: ColumnStore + Sync,
    S: SearchIndex + Sync,
{
    /// create a syncer which reconciles mappings one after another.
    pub fn new(column: C, index: S) -> Self {
        ReconcileSyncer {
            column,
            index,
            watermarks: WatermarkStore::new(),
            clock: Arc::new(SystemClock),
            pool: None,
            mappings: vec![],
        }
    }

    /// Create a syncer for every mapping of `conf`.
    ///
    /// Mappings are validated first, `connect` is only called once they are all valid, so a
    /// configuration error never reaches a store.
    pub fn from_config<F>(conf: &SyncerConfig, connect: F) -> Result<Self>
    where
        F: FnOnce() -> Result<(C, S)>,
    {
        let mappings = conf.get_mappings()?;
        let (column, index) = connect()?;
        let mut syncer = ReconcileSyncer::new(column, index)
            .with_mapping_concurrent(conf.get_mapping_concurrent())?;
        syncer.mappings = mappings;
        Ok(syncer)
    }

    /// use `clock` to decide scan windows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// reconcile up to `concurrent` mappings at the same time.
    pub fn with_mapping_concurrent(mut self, concurrent: usize) -> Result<Self> {
        self.pool = if concurrent > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(concurrent)
                .thread_name(|i| format!("mapping-sync-{}", i))
                .build()
                .map_err(|e| SyncError::ConfigurationError(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(self)
    }

    pub fn column_store(&self) -> &C {
        &self.column
    }

    pub fn search_index(&self) -> &S {
        &self.index
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// mappings resolved by [ReconcileSyncer::from_config].
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Run one pass over the mappings resolved from configuration.
    pub fn sync_configured(&self) -> Result<PassReport> {
        self.sync_all(&self.mappings)
    }

    /// Run one pass over every mapping.
    ///
    /// A failed mapping doesn't stop the others, every failure is returned in
    /// [SyncError::PassFailed] once all mappings ran.
    pub fn sync_all(&self, mappings: &[Mapping]) -> Result<PassReport> {
        info!(mappings = mappings.len(), "Begin reconcile pass.");
        let statuses: Vec<MappingStatus> = match &self.pool {
            None => mappings
                .iter()
                .enumerate()
                .map(|(i, m)| match self.sync_mapping(m) {
                    Ok(report) => MappingStatus::Done(i, report),
                    Err(e) => MappingStatus::Failed(i, m.to_string(), e),
                })
                .collect(),
            Some(pool) => self.sync_concurrent(pool, mappings),
        };

        let mut reports: Vec<(usize, MappingReport)> = vec![];
        let mut failures: Vec<(usize, String, SyncError)> = vec![];
        for status in statuses {
            match status {
                MappingStatus::Done(i, report) => reports.push((i, report)),
                MappingStatus::Failed(i, mapping, e) => {
                    error!(%mapping, ?e, "Reconcile mapping failed.");
                    failures.push((i, mapping, e));
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(i, _, _)| *i);
            return Err(SyncError::PassFailed {
                failures: failures.into_iter().map(|(_, m, e)| (m, e)).collect(),
            });
        }
        reports.sort_by_key(|(i, _)| *i);
        let report = PassReport {
            mappings: reports.into_iter().map(|(_, r)| r).collect(),
        };
        let written: usize = report.mappings.iter().map(|r| r.written()).sum();
        info!(written, "Reconcile pass complete.");
        Ok(report)
    }

    fn sync_concurrent(&self, pool: &ThreadPool, mappings: &[Mapping]) -> Vec<MappingStatus> {
        let (sender, receiver) = channel::unbounded();
        pool.scope(|s| {
            for (i, mapping) in mappings.iter().enumerate() {
                let sender = sender.clone();
                s.spawn(move |_| {
                    let status = match self.sync_mapping(mapping) {
                        Ok(report) => MappingStatus::Done(i, report),
                        Err(e) => MappingStatus::Failed(i, mapping.to_string(), e),
                    };
                    let _ = sender.send(status);
                });
            }
        });
        drop(sender);
        receiver.iter().collect()
    }

    /// Run one reconcile pass for `mapping`.
    ///
    /// Order is fixed: fetch source summaries, fetch sink summaries, reconcile, materialize every
    /// direction with work, then apply them.  Each side's watermark moves right after its
    /// summaries are fetched, a failed fetch leaves it untouched.
    pub fn sync_mapping(&self, mapping: &Mapping) -> Result<MappingReport> {
        let (source, sink) = (mapping.source(), mapping.sink());

        let source_key = WatermarkKey::new(mapping, Side::ColumnStore);
        let now = self.clock.now();
        let window = self.watermarks.window(&source_key, now);
        let source_summaries = fetcher::fetch_source_summaries(&self.column, source, window)?;
        self.watermarks.advance(&source_key, now);

        let sink_key = WatermarkKey::new(mapping, Side::SearchIndex);
        let now = self.clock.now();
        let window = self.watermarks.window(&sink_key, now);
        let sink_summaries = fetcher::fetch_sink_summaries(&self.index, sink, window)?;
        self.watermarks.advance(&sink_key, now);

        let scan_time = time_helper::to_datetime(now);
        let plan = reconciler::SyncPlan::new(&reconciler::reconcile(
            &source_summaries,
            &sink_summaries,
        ));
        info!(
            %mapping,
            %scan_time,
            source = source_summaries.len(),
            sink = sink_summaries.len(),
            insert_into_sink = plan.insert_into_sink.len(),
            update_sink = plan.update_sink.len(),
            insert_into_source = plan.insert_into_source.len(),
            update_source = plan.update_source.len(),
            "Reconcile state: summaries classified."
        );

        let mut report = MappingReport {
            mapping: mapping.to_string(),
            unchanged: plan.unchanged,
            ..MappingReport::default()
        };

        // both directions are materialized before anything is written, so an id which can't be
        // converted aborts the mapping with both sides untouched.
        let to_sink = if plan.has_sink_work() {
            materializer::materialize_for_sink(
                &self.column,
                mapping,
                &plan.insert_into_sink,
                &plan.update_sink,
            )?
        } else {
            vec![]
        };
        let to_source = if plan.has_source_work() {
            materializer::materialize_for_source(
                &self.index,
                mapping,
                &plan.insert_into_source,
                &plan.update_source,
            )?
        } else {
            vec![]
        };

        if !to_sink.is_empty() {
            let (inserts, updates) = count_ops(&to_sink);
            applier::apply_to_sink(&self.index, sink, to_sink)?;
            report.inserted_into_sink = inserts;
            report.updated_sink = updates;
        }
        if !to_source.is_empty() {
            let (inserts, updates) = count_ops(&to_source);
            applier::apply_to_source(&self.column, source, to_source)?;
            report.inserted_into_source = inserts;
            report.updated_source = updates;
        }

        Ok(report)
    }
}

fn count_ops<I>(statements: &[WriteStatement<I>]) -> (usize, usize) {
    let inserts = statements
        .iter()
        .filter(|st| st.op == WriteOp::Insert)
        .count();
    (inserts, statements.len() - inserts)
}
