//! Key-based pairing of the records of one lastname group.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use metrics::counter;
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, ReconcileResult};
use crate::metrics::{RECONCILE_GROUPS_TOTAL, RECONCILE_MULTI_MATCHES_TOTAL};
use crate::sink::{BatchSink, MatchStore, SinkStats};
use crate::types::{FullNameKey, Keyed, LastnameGroup, MatchRecord, RelationalRecord, ReportContext};

/// Receives a notification for every emitted match.
pub trait MatchObserver {
    /// Counts one match.
    fn record_match(&mut self);

    /// Offers a match record as a sample for the run summary.
    fn sample_record(&mut self, record: &MatchRecord);
}

/// Counters of a [`MatchEngine`], including the final sink counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSummary {
    pub groups_processed: u64,
    pub matches: u64,
    /// Matches whose relational user had already been matched in the same group.
    pub multi_matches: u64,
    pub sink: SinkStats,
}

struct Candidate {
    record: RelationalRecord,
    hits: u32,
}

/// Pairs remote and relational users sharing a full name and forwards match records to the sink.
#[derive(Debug)]
pub struct MatchEngine<S, O> {
    context: ReportContext,
    sink: BatchSink<S>,
    observer: O,
    summary: EngineSummary,
}

impl<S, O> MatchEngine<S, O>
where
    S: MatchStore,
    O: MatchObserver,
{
    pub fn new(context: ReportContext, sink: BatchSink<S>, observer: O) -> Self {
        Self {
            context,
            sink,
            observer,
            summary: EngineSummary::default(),
        }
    }

    /// Matches one group and returns the number of match records emitted for it.
    ///
    /// Fails with [`ErrorKind::DuplicateMatchKey`] before emitting anything when two relational
    /// users of the group share a full name.
    pub async fn process_group(&mut self, group: LastnameGroup) -> ReconcileResult<u64> {
        let (key, remote, relational) = group.into_parts();

        debug!(
            lastname = %key,
            remote = remote.len(),
            relational = relational.len(),
            "combining group"
        );

        let mut candidates: HashMap<FullNameKey, Candidate> =
            HashMap::with_capacity(relational.len());
        for record in relational {
            match candidates.entry(record.full_name_key()) {
                Entry::Occupied(existing) => {
                    bail!(
                        ErrorKind::DuplicateMatchKey,
                        "Duplicate full name in relational group",
                        format!(
                            "`{}` is shared by relational users {} and {}",
                            existing.key(),
                            existing.get().record.id,
                            record.id
                        )
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(Candidate { record, hits: 0 });
                }
            }
        }

        let mut emitted = 0;
        for remote_record in &remote {
            let Some(candidate) = candidates.get_mut(&remote_record.full_name_key()) else {
                continue;
            };

            let match_record = MatchRecord::derive(&self.context, remote_record, &candidate.record);

            candidate.hits += 1;
            if candidate.hits > 1 {
                info!(
                    relational_user_id = candidate.record.id,
                    remote_user_id = remote_record.id,
                    hits = candidate.hits,
                    "found multi-match"
                );
                self.summary.multi_matches += 1;
                counter!(RECONCILE_MULTI_MATCHES_TOTAL).increment(1);
            }

            self.observer.record_match();
            self.observer.sample_record(&match_record);
            self.sink.add(match_record).await?;

            self.summary.matches += 1;
            emitted += 1;
        }

        self.summary.groups_processed += 1;
        counter!(RECONCILE_GROUPS_TOTAL).increment(1);

        Ok(emitted)
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            sink: self.sink.stats(),
            ..self.summary
        }
    }

    /// Flushes the sink one last time and returns the final counters and the observer.
    pub async fn finish(mut self) -> ReconcileResult<(EngineSummary, O)> {
        self.sink.flush().await?;

        let summary = self.summary();
        info!(
            groups = summary.groups_processed,
            matches = summary.matches,
            flushes = summary.sink.flushes,
            "match engine finished"
        );

        Ok((summary, self.observer))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use reconcile_config::shared::BatchConfig;

    use super::*;
    use crate::collector::MetricsCollector;
    use crate::sink::memory::MemoryMatchStore;
    use crate::test_utils::{nistler_group, relational_user, remote_user};
    use crate::types::LastnameKey;

    fn engine(store: &MemoryMatchStore) -> MatchEngine<MemoryMatchStore, MetricsCollector> {
        let sink = BatchSink::new(store.clone(), &BatchConfig::default(), false, None).unwrap();
        let context = ReportContext::new(NaiveDate::from_ymd_opt(2017, 2, 2).unwrap());

        MatchEngine::new(context, sink, MetricsCollector::new())
    }

    #[tokio::test]
    async fn only_exact_full_names_match() {
        let store = MemoryMatchStore::new();
        let mut engine = engine(&store);

        let emitted = engine.process_group(nistler_group()).await.unwrap();
        assert_eq!(emitted, 1);

        let (summary, collector) = engine.finish().await.unwrap();
        let records = store.records().await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relational_user_id, 916915);
        assert_eq!(records[0].remote_user_id, 93519);
        assert_eq!(summary.matches, 1);
        assert_eq!(summary.sink.flushes, 1);
        assert_eq!(collector.matches(), 1);
        assert_eq!(collector.samples().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_relational_names_fail_before_emitting() {
        let store = MemoryMatchStore::new();
        let mut engine = engine(&store);

        let mut group = LastnameGroup::new(LastnameKey::new("Nistler"));
        group.push(remote_user(1, "Anthony", "Nistler").into());
        group.push(relational_user(10, "Anthony", "Nistler").into());
        group.push(relational_user(11, " anthony", "NISTLER").into());

        let err = engine.process_group(group).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateMatchKey);

        let (summary, collector) = engine.finish().await.unwrap();
        assert_eq!(summary.matches, 0);
        assert!(store.records().await.is_empty());
        assert_eq!(collector.matches(), 0);
    }

    #[tokio::test]
    async fn every_remote_match_is_emitted_for_a_shared_relational_user() {
        let store = MemoryMatchStore::new();
        let mut engine = engine(&store);

        let mut group = LastnameGroup::new(LastnameKey::new("Nistler"));
        group.push(remote_user(1, "Kyle", "Nistler").into());
        group.push(remote_user(2, "kyle", "Nistler").into());
        group.push(relational_user(10, "Kyle", "Nistler").into());

        assert_eq!(engine.process_group(group).await.unwrap(), 2);
        assert_eq!(engine.summary().multi_matches, 1);
    }

    #[tokio::test]
    async fn one_sided_groups_emit_nothing() {
        let store = MemoryMatchStore::new();
        let mut engine = engine(&store);

        let mut group = LastnameGroup::new(LastnameKey::new("Nistler"));
        group.push(relational_user(10, "Kyle", "Nistler").into());

        assert_eq!(engine.process_group(group).await.unwrap(), 0);
        assert_eq!(engine.summary().groups_processed, 1);
    }
}
