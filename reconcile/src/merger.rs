//! Online merge-join of the two lastname-sorted producer queues.
//!
//! The merger holds one current record per side. While the keys differ it advances the side with
//! the smaller key (aligning). On equal keys it drains every contiguous record with that key from
//! both sides into a [`LastnameGroup`] and hands it to the [`MatchEngine`] (grouping). A dequeue
//! timeout or a closed queue means the side is exhausted and ends the merge (drained), after
//! which both producers are stopped and joined.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{MatchEngine, MatchObserver};
use crate::error::{ReconcileError, ReconcileResult};
use crate::sink::MatchStore;
use crate::types::{Keyed, LastnameGroup, LastnameKey, RelationalRecord, RemoteRecord, SourceRecord};
use crate::workers::{BatchFetcher, Dequeued, Producer, ProducerHandle, ProducerStats, Side};

/// Why a merge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The remote side produced no record at all; the relational producer was never started.
    RemoteEmpty,
    /// The remote side timed out or closed.
    RemoteExhausted,
    /// The relational side timed out or closed.
    RelationalExhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Termination::RemoteEmpty => "remote empty",
            Termination::RemoteExhausted => "remote exhausted",
            Termination::RelationalExhausted => "relational exhausted",
        };

        f.write_str(reason)
    }
}

/// Outcome of a completed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub groups_emitted: u64,
    pub remote_records: u64,
    pub relational_records: u64,
    pub termination: Termination,
    pub remote_stats: ProducerStats,
    /// [`None`] when the relational producer was never started.
    pub relational_stats: Option<ProducerStats>,
}

/// A running producer plus the consumer-side bookkeeping of the merger.
struct SideStream<R> {
    handle: ProducerHandle<R>,
    timeout: Duration,
    consumed: u64,
    last_key: Option<LastnameKey>,
}

impl<R> SideStream<R>
where
    R: Keyed,
{
    fn new(handle: ProducerHandle<R>, timeout: Duration) -> Self {
        Self {
            handle,
            timeout,
            consumed: 0,
            last_key: None,
        }
    }

    /// Returns the next record, or [`None`] once the side is exhausted.
    async fn next(&mut self) -> Option<R> {
        match self.handle.dequeue(self.timeout).await {
            Dequeued::Record(record) => {
                self.consumed += 1;

                let key = record.lastname_key();
                if let Some(last_key) = &self.last_key
                    && key < *last_key
                {
                    warn!(
                        side = %self.handle.side(),
                        previous = %last_key,
                        current = %key,
                        "records arrived out of lastname order"
                    );
                }
                self.last_key = Some(key);

                Some(record)
            }
            Dequeued::TimedOut => {
                info!(
                    side = %self.handle.side(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "queue dequeue timed out, treating side as exhausted"
                );
                None
            }
            Dequeued::Closed => {
                info!(side = %self.handle.side(), "queue closed, side exhausted");
                None
            }
        }
    }

    /// Pushes every record with `key` into `group`.
    ///
    /// Returns the first record with a different key, or [`None`] when the side ran out.
    async fn drain_into(&mut self, key: &LastnameKey, group: &mut LastnameGroup) -> Option<R>
    where
        R: Into<SourceRecord>,
    {
        loop {
            let record = self.next().await?;
            if record.lastname_key() != *key {
                return Some(record);
            }

            group.push(record.into());
        }
    }
}

/// Coordinates the two producers and feeds matching groups to a [`MatchEngine`].
#[derive(Debug)]
pub struct StreamMerger<R, L> {
    remote: Producer<R>,
    relational: Producer<L>,
    remote_timeout: Duration,
    relational_timeout: Duration,
}

impl<R, L> StreamMerger<R, L>
where
    R: BatchFetcher<Record = RemoteRecord>,
    L: BatchFetcher<Record = RelationalRecord>,
{
    pub fn new(
        remote: Producer<R>,
        relational: Producer<L>,
        remote_timeout: Duration,
        relational_timeout: Duration,
    ) -> Self {
        debug_assert_eq!(remote.side(), Side::Remote);
        debug_assert_eq!(relational.side(), Side::Relational);

        Self {
            remote,
            relational,
            remote_timeout,
            relational_timeout,
        }
    }

    /// Runs the merge to completion.
    ///
    /// Both producers are always stopped and joined before returning. An engine fault comes
    /// first, followed by producer faults, aggregated into one error when there are several.
    pub async fn run<S, O>(self, engine: &mut MatchEngine<S, O>) -> ReconcileResult<MergeSummary>
    where
        S: MatchStore,
        O: MatchObserver,
    {
        let Self {
            remote,
            mut relational,
            remote_timeout,
            relational_timeout,
        } = self;

        let mut remote = SideStream::new(remote.spawn(), remote_timeout);

        let Some(first_remote) = remote.next().await else {
            info!("remote side produced no records, skipping relational side");

            let remote_stats = remote.handle.wait().await?;
            return Ok(MergeSummary {
                groups_emitted: 0,
                remote_records: 0,
                relational_records: 0,
                termination: Termination::RemoteEmpty,
                remote_stats,
                relational_stats: None,
            });
        };

        relational.set_start_key(first_remote.lastname_key());
        let mut relational = SideStream::new(relational.spawn(), relational_timeout);

        let mut groups_emitted = 0;
        let merged = merge(
            first_remote,
            &mut remote,
            &mut relational,
            engine,
            &mut groups_emitted,
        )
        .await;

        debug!(groups_emitted, "merger drained, stopping producers");

        let remote_records = remote.consumed;
        let relational_records = relational.consumed;
        let remote_stats = remote.handle.wait().await;
        let relational_stats = relational.handle.wait().await;

        let mut errors: Vec<ReconcileError> = Vec::new();
        let termination = merged.map_err(|err| errors.push(err)).ok();
        let remote_stats = remote_stats.map_err(|err| errors.push(err)).ok();
        let relational_stats = relational_stats.map_err(|err| errors.push(err)).ok();

        match (termination, remote_stats, relational_stats) {
            (Some(termination), Some(remote_stats), Some(relational_stats)) => {
                info!(
                    groups_emitted,
                    remote_records,
                    relational_records,
                    %termination,
                    "merge finished"
                );

                Ok(MergeSummary {
                    groups_emitted,
                    remote_records,
                    relational_records,
                    termination,
                    remote_stats,
                    relational_stats: Some(relational_stats),
                })
            }
            _ => Err(errors.into()),
        }
    }
}

/// The aligning/grouping loop. Returns which side ran out first.
async fn merge<S, O>(
    first_remote: RemoteRecord,
    remote: &mut SideStream<RemoteRecord>,
    relational: &mut SideStream<RelationalRecord>,
    engine: &mut MatchEngine<S, O>,
    groups_emitted: &mut u64,
) -> ReconcileResult<Termination>
where
    S: MatchStore,
    O: MatchObserver,
{
    let mut remote_current = first_remote;
    let Some(mut relational_current) = relational.next().await else {
        return Ok(Termination::RelationalExhausted);
    };

    debug!("merger aligning");

    loop {
        let key = remote_current.lastname_key();

        match key.cmp(&relational_current.lastname_key()) {
            Ordering::Less => {
                let Some(next) = remote.next().await else {
                    return Ok(Termination::RemoteExhausted);
                };
                remote_current = next;
                continue;
            }
            Ordering::Greater => {
                let Some(next) = relational.next().await else {
                    return Ok(Termination::RelationalExhausted);
                };
                relational_current = next;
                continue;
            }
            Ordering::Equal => {}
        }

        debug!(lastname = %key, "merger grouping");

        let mut group = LastnameGroup::new(key.clone());
        group.push(remote_current.into());
        group.push(relational_current.into());

        let remote_next = remote.drain_into(&key, &mut group).await;
        let relational_next = relational.drain_into(&key, &mut group).await;

        engine.process_group(group).await?;
        *groups_emitted += 1;

        match (remote_next, relational_next) {
            (Some(remote_record), Some(relational_record)) => {
                remote_current = remote_record;
                relational_current = relational_record;
                debug!("merger aligning");
            }
            (None, _) => return Ok(Termination::RemoteExhausted),
            (_, None) => return Ok(Termination::RelationalExhausted),
        }
    }
}
