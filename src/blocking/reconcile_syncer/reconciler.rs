//! Classify every identifier seen on either side.
//!
//! Newer timestamp wins, strictly: equal timestamps never propagate, so running a pass again over
//! unchanged data does nothing.
use crate::record::RecordSummary;
use std::collections::BTreeMap;

/// What to do with one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    InsertIntoSink,
    UpdateSink,
    InsertIntoSource,
    UpdateSource,
    NoAction,
}

/// Timestamps of one identifier on both sides.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergedEntry {
    pub source: Option<i64>,
    pub sink: Option<i64>,
}

impl MergedEntry {
    pub fn disposition(&self) -> Disposition {
        match (self.source, self.sink) {
            (Some(src), Some(dst)) if src > dst => Disposition::UpdateSink,
            (Some(src), Some(dst)) if dst > src => Disposition::UpdateSource,
            (Some(_), Some(_)) => Disposition::NoAction,
            (Some(_), None) => Disposition::InsertIntoSink,
            (None, Some(_)) => Disposition::InsertIntoSource,
            (None, None) => Disposition::NoAction,
        }
    }
}

fn keep_newest(slot: &mut Option<i64>, ts: i64) {
    *slot = Some(slot.map_or(ts, |old| old.max(ts)));
}

/// Merge two summary sets by identifier.
///
/// An identifier listed twice on the same side keeps its newest timestamp.
pub fn merge(source: &[RecordSummary], sink: &[RecordSummary]) -> BTreeMap<String, MergedEntry> {
    let mut merged: BTreeMap<String, MergedEntry> = BTreeMap::new();
    for s in source {
        keep_newest(&mut merged.entry(s.id.clone()).or_default().source, s.timestamp);
    }
    for s in sink {
        keep_newest(&mut merged.entry(s.id.clone()).or_default().sink, s.timestamp);
    }
    merged
}

/// Decide a disposition for every identifier in `source` or `sink`.
pub fn reconcile(
    source: &[RecordSummary],
    sink: &[RecordSummary],
) -> BTreeMap<String, Disposition> {
    merge(source, sink)
        .into_iter()
        .map(|(id, entry)| (id, entry.disposition()))
        .collect()
}

/// Dispositions grouped by direction and write kind, ids are in ascending order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub insert_into_sink: Vec<String>,
    pub update_sink: Vec<String>,
    pub insert_into_source: Vec<String>,
    pub update_source: Vec<String>,
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn new(dispositions: &BTreeMap<String, Disposition>) -> Self {
        let mut plan = SyncPlan::default();
        for (id, disposition) in dispositions {
            match disposition {
                Disposition::InsertIntoSink => plan.insert_into_sink.push(id.clone()),
                Disposition::UpdateSink => plan.update_sink.push(id.clone()),
                Disposition::InsertIntoSource => plan.insert_into_source.push(id.clone()),
                Disposition::UpdateSource => plan.update_source.push(id.clone()),
                Disposition::NoAction => plan.unchanged += 1,
            }
        }
        plan
    }

    /// is there anything to write into the search index?
    pub fn has_sink_work(&self) -> bool {
        !(self.insert_into_sink.is_empty() && self.update_sink.is_empty())
    }

    /// is there anything to write into the column store?
    pub fn has_source_work(&self) -> bool {
        !(self.insert_into_source.is_empty() && self.update_source.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn summaries(items: &[(&str, i64)]) -> Vec<RecordSummary> {
        items
            .iter()
            .map(|(id, ts)| RecordSummary::new(id.to_string(), *ts))
            .collect()
    }

    #[test]
    fn test_reconcile_all_dispositions() {
        let source = summaries(&[("a", 200), ("b", 100), ("c", 100), ("d", 100)]);
        let sink = summaries(&[("a", 100), ("b", 200), ("c", 100), ("e", 100)]);
        let result = reconcile(&source, &sink);
        assert_eq!(result["a"], Disposition::UpdateSink);
        assert_eq!(result["b"], Disposition::UpdateSource);
        assert_eq!(result["c"], Disposition::NoAction);
        assert_eq!(result["d"], Disposition::InsertIntoSink);
        assert_eq!(result["e"], Disposition::InsertIntoSource);
        assert_eq!(result.len(), 5);

        let plan = SyncPlan::new(&result);
        assert_eq!(plan.update_sink, vec!["a"]);
        assert_eq!(plan.update_source, vec!["b"]);
        assert_eq!(plan.insert_into_sink, vec!["d"]);
        assert_eq!(plan.insert_into_source, vec!["e"]);
        assert_eq!(plan.unchanged, 1);
        assert!(plan.has_sink_work());
        assert!(plan.has_source_work());
    }

    #[test]
    fn test_duplicate_ids_keep_newest() {
        let source = summaries(&[("a", 100), ("a", 300), ("a", 200)]);
        let sink = summaries(&[("a", 250)]);
        let merged = merge(&source, &sink);
        assert_eq!(
            merged["a"],
            MergedEntry {
                source: Some(300),
                sink: Some(250)
            }
        );
    }

    #[test]
    fn test_empty_plan() {
        let plan = SyncPlan::new(&reconcile(&[], &[]));
        assert!(!plan.has_sink_work());
        assert!(!plan.has_source_work());
        assert_eq!(plan, SyncPlan::default());
    }

    fn arb_side() -> impl Strategy<Value = HashMap<String, i64>> {
        prop::collection::hash_map("[a-f]{1,2}", 0i64..50, 0..20)
    }

    fn to_summaries(side: &HashMap<String, i64>) -> Vec<RecordSummary> {
        side.iter()
            .map(|(id, ts)| RecordSummary::new(id.clone(), *ts))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_identical_sides_are_idempotent(side in arb_side()) {
            let s = to_summaries(&side);
            let result = reconcile(&s, &s);
            prop_assert!(result.values().all(|d| *d == Disposition::NoAction));
            prop_assert_eq!(result.len(), side.len());
        }

        #[test]
        fn prop_every_id_classified_once(source in arb_side(), sink in arb_side()) {
            let result = reconcile(&to_summaries(&source), &to_summaries(&sink));
            let plan = SyncPlan::new(&result);
            let ids: std::collections::HashSet<&String> =
                source.keys().chain(sink.keys()).collect();
            prop_assert_eq!(result.len(), ids.len());
            prop_assert_eq!(
                plan.insert_into_sink.len() + plan.update_sink.len()
                    + plan.insert_into_source.len() + plan.update_source.len() + plan.unchanged,
                ids.len()
            );

            for (id, disposition) in result.iter() {
                let expected = match (source.get(id), sink.get(id)) {
                    (Some(a), Some(b)) if a > b => Disposition::UpdateSink,
                    (Some(a), Some(b)) if b > a => Disposition::UpdateSource,
                    (Some(_), Some(_)) => Disposition::NoAction,
                    (Some(_), None) => Disposition::InsertIntoSink,
                    (None, Some(_)) => Disposition::InsertIntoSource,
                    (None, None) => unreachable!(),
                };
                prop_assert_eq!(*disposition, expected);
            }
        }

        #[test]
        fn prop_input_order_does_not_matter(source in arb_side(), sink in arb_side()) {
            let (src, dst) = (to_summaries(&source), to_summaries(&sink));
            let mut src_rev = src.clone();
            src_rev.reverse();
            let mut dst_rev = dst.clone();
            dst_rev.reverse();
            prop_assert_eq!(reconcile(&src, &dst), reconcile(&src_rev, &dst_rev));
        }

        #[test]
        fn prop_equal_timestamps_never_propagate(
            ids in prop::collection::hash_set("[a-z]{1,3}", 0..20),
            ts in 0i64..1000,
        ) {
            let s: Vec<RecordSummary> = ids
                .iter()
                .map(|id| RecordSummary::new(id.clone(), ts))
                .collect();
            let result = reconcile(&s, &s);
            prop_assert!(result.values().all(|d| *d == Disposition::NoAction));
        }
    }
}
