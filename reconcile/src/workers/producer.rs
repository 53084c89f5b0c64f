use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info};

use crate::bail;
use crate::concurrency::stop::{StopRx, StopTx, create_stop_channel, stopped};
use crate::error::{ErrorKind, ReconcileResult};
use crate::metrics::{
    RECONCILE_BATCHES_FETCHED_TOTAL, RECONCILE_FETCH_DURATION_SECONDS,
    RECONCILE_RECORDS_DISCARDED_TOTAL, RECONCILE_RECORDS_ENQUEUED_TOTAL,
    RECONCILE_RECORDS_SKIPPED_TOTAL, SIDE_LABEL,
};
use crate::reconcile_error;
use crate::types::{Keyed, LastnameKey};

/// Which source a producer reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Remote,
    Relational,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Remote => "remote",
            Side::Relational => "relational",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paging strategy of a producer.
///
/// Each call returns the next batch in ascending lastname order. An empty batch means the source
/// is exhausted and the producer ends.
pub trait BatchFetcher: Send + 'static {
    type Record: Keyed + Send + 'static;

    fn fetch_next(
        &mut self,
        limit: usize,
    ) -> impl Future<Output = ReconcileResult<Vec<Self::Record>>> + Send;

    /// Lets the fetcher skip ahead to `key` at the source. The default does nothing and relies on
    /// the producer filtering client-side.
    fn set_start_key(&mut self, _key: &LastnameKey) {}
}

/// Counters reported by a producer task when it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub batches_fetched: u64,
    pub records_enqueued: u64,
    /// Records dropped because they sort before the start key.
    pub records_skipped: u64,
}

/// Outcome of a single [`ProducerHandle::dequeue`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<R> {
    Record(R),
    /// Nothing arrived within the timeout.
    TimedOut,
    /// The producer task ended and its queue is empty.
    Closed,
}

/// Computes a queue size holding `percent` of a population of `total` records.
///
/// Never returns zero so the result is always a valid capacity.
pub fn working_set_capacity(total: u64, percent: u8) -> ReconcileResult<usize> {
    if !(1..=100).contains(&percent) {
        bail!(
            ErrorKind::ConfigError,
            "Working data percent out of range",
            format!("{percent} is not between 1 and 100")
        );
    }

    let capacity = total.saturating_mul(percent as u64) / 100;
    info!(percent, total, capacity, "computed working set capacity");

    Ok(capacity.max(1) as usize)
}

/// A source producer that has not been started yet.
#[derive(Debug)]
pub struct Producer<F> {
    side: Side,
    capacity: usize,
    batch_fetch_size: usize,
    start_key: Option<LastnameKey>,
    fetcher: F,
}

impl<F> Producer<F>
where
    F: BatchFetcher,
{
    /// Creates a producer with a queue of `capacity` records that fetches `batch_fetch_size`
    /// records at a time.
    pub fn new(
        side: Side,
        capacity: usize,
        batch_fetch_size: usize,
        fetcher: F,
    ) -> ReconcileResult<Self> {
        if capacity == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Producer queue capacity must be greater than 0",
                format!("{side} producer")
            );
        }

        if batch_fetch_size == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Producer batch fetch size must be greater than 0",
                format!("{side} producer")
            );
        }

        Ok(Self {
            side,
            capacity,
            batch_fetch_size,
            start_key: None,
            fetcher,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Skips every record whose lastname sorts strictly before `key`.
    pub fn set_start_key(&mut self, key: LastnameKey) {
        info!(side = %self.side, start_key = %key, "producer start key set");

        self.fetcher.set_start_key(&key);
        self.start_key = Some(key);
    }

    /// Spawns the producer task and returns the consuming handle.
    pub fn spawn(self) -> ProducerHandle<F::Record> {
        let side = self.side;
        let (tx, rx) = mpsc::channel(self.capacity);
        let (stop_tx, stop_rx) = create_stop_channel();

        info!(
            %side,
            capacity = self.capacity,
            batch_fetch_size = self.batch_fetch_size,
            "starting producer"
        );

        let producer_span = tracing::info_span!("producer", side = side.as_str());
        let producer = run_producer(
            side,
            self.fetcher,
            self.batch_fetch_size,
            self.start_key,
            tx,
            stop_rx,
        )
        .instrument(producer_span.or_current());

        let handle = tokio::spawn(producer);

        ProducerHandle {
            side,
            rx,
            stop_tx,
            handle: Some(handle),
            stop_requested: false,
        }
    }
}

async fn run_producer<F>(
    side: Side,
    mut fetcher: F,
    batch_fetch_size: usize,
    start_key: Option<LastnameKey>,
    tx: mpsc::Sender<F::Record>,
    mut stop_rx: StopRx,
) -> ReconcileResult<ProducerStats>
where
    F: BatchFetcher,
{
    let mut stats = ProducerStats::default();

    loop {
        if *stop_rx.borrow() {
            info!("producer stopped before fetching");
            return Ok(stats);
        }

        let before_fetch = Instant::now();
        let batch = tokio::select! {
            biased;

            _ = stopped(&mut stop_rx) => {
                info!("producer stopped while fetching");
                return Ok(stats);
            }
            batch = fetcher.fetch_next(batch_fetch_size) => batch?,
        };

        histogram!(RECONCILE_FETCH_DURATION_SECONDS, SIDE_LABEL => side.as_str())
            .record(before_fetch.elapsed().as_secs_f64());

        if batch.is_empty() {
            info!(
                records_enqueued = stats.records_enqueued,
                "source exhausted, producer finished"
            );
            return Ok(stats);
        }

        stats.batches_fetched += 1;
        counter!(RECONCILE_BATCHES_FETCHED_TOTAL, SIDE_LABEL => side.as_str()).increment(1);

        for record in batch {
            if let Some(start_key) = &start_key
                && record.lastname_key() < *start_key
            {
                stats.records_skipped += 1;
                counter!(RECONCILE_RECORDS_SKIPPED_TOTAL, SIDE_LABEL => side.as_str())
                    .increment(1);
                continue;
            }

            tokio::select! {
                biased;

                _ = stopped(&mut stop_rx) => {
                    info!("producer stopped while enqueuing");
                    return Ok(stats);
                }
                sent = tx.send(record) => {
                    if sent.is_err() {
                        info!("producer queue closed by the consumer");
                        return Ok(stats);
                    }
                }
            }

            stats.records_enqueued += 1;
            counter!(RECONCILE_RECORDS_ENQUEUED_TOTAL, SIDE_LABEL => side.as_str()).increment(1);
        }
    }
}

/// Consuming side of a running producer.
#[derive(Debug)]
pub struct ProducerHandle<R> {
    side: Side,
    rx: mpsc::Receiver<R>,
    stop_tx: StopTx,
    handle: Option<JoinHandle<ReconcileResult<ProducerStats>>>,
    stop_requested: bool,
}

impl<R> ProducerHandle<R> {
    pub fn side(&self) -> Side {
        self.side
    }

    /// Waits up to `timeout` for the next record.
    pub async fn dequeue(&mut self, timeout: Duration) -> Dequeued<R> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(record)) => Dequeued::Record(record),
            Ok(None) => Dequeued::Closed,
            Err(_) => Dequeued::TimedOut,
        }
    }

    /// Stops the producer and discards everything still buffered in its queue.
    ///
    /// Returns the number of discarded records. Calling it again only drains what is left.
    pub fn stop(&mut self) -> usize {
        if !self.stop_requested {
            self.stop_requested = true;
            self.stop_tx.stop();
            self.rx.close();
        }

        let mut discarded = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => discarded += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if discarded > 0 {
            info!(side = %self.side, discarded, "discarded buffered records on stop");
            counter!(RECONCILE_RECORDS_DISCARDED_TOTAL, SIDE_LABEL => self.side.as_str())
                .increment(discarded as u64);
        } else {
            debug!(side = %self.side, "producer queue drained");
        }

        discarded
    }

    /// Stops the producer if needed and waits for its task to end.
    ///
    /// Returns the producer's statistics, or the fault that ended it.
    pub async fn wait(mut self) -> ReconcileResult<ProducerStats> {
        self.stop();

        let Some(handle) = self.handle.take() else {
            return Ok(ProducerStats::default());
        };

        let side = self.side;
        handle.await.map_err(|err| {
            if err.is_cancelled() {
                reconcile_error!(
                    ErrorKind::ProducerCancelled,
                    "Producer task was cancelled",
                    format!("{side} producer: {err}")
                )
            } else {
                reconcile_error!(
                    ErrorKind::ProducerPanic,
                    "Producer task panicked",
                    format!("{side} producer: {err}")
                )
            }
        })?
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::NaiveDate;

    use super::*;
    use crate::types::RelationalRecord;

    /// Serves pre-built batches, optionally failing once they run out.
    #[derive(Debug)]
    struct ScriptedFetcher {
        batches: VecDeque<Vec<RelationalRecord>>,
        fail_at_end: bool,
    }

    impl ScriptedFetcher {
        fn new(batches: Vec<Vec<RelationalRecord>>) -> Self {
            Self {
                batches: batches.into(),
                fail_at_end: false,
            }
        }
    }

    impl BatchFetcher for ScriptedFetcher {
        type Record = RelationalRecord;

        async fn fetch_next(&mut self, _limit: usize) -> ReconcileResult<Vec<RelationalRecord>> {
            match self.batches.pop_front() {
                Some(batch) => Ok(batch),
                None if self.fail_at_end => {
                    bail!(ErrorKind::SourceQueryFailed, "Scripted failure")
                }
                None => Ok(Vec::new()),
            }
        }
    }

    fn user(id: u64, lastname: &str) -> RelationalRecord {
        RelationalRecord {
            id,
            firstname: format!("First{id}"),
            lastname: lastname.to_string(),
            location: "arab".to_string(),
            specialty: "Neurology".to_string(),
            classification: "popular".to_string(),
            last_active_date: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn zero_sizes_are_rejected() {
        let err = Producer::new(Side::Remote, 0, 10, ScriptedFetcher::new(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let err =
            Producer::new(Side::Relational, 10, 0, ScriptedFetcher::new(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn working_set_capacity_is_a_share_of_the_population() {
        assert_eq!(working_set_capacity(200_000, 10).unwrap(), 20_000);
        assert_eq!(working_set_capacity(5, 10).unwrap(), 1);
        assert_eq!(
            working_set_capacity(10, 0).unwrap_err().kind(),
            ErrorKind::ConfigError
        );
        assert_eq!(
            working_set_capacity(10, 101).unwrap_err().kind(),
            ErrorKind::ConfigError
        );
    }

    #[tokio::test]
    async fn records_arrive_in_order_then_queue_closes() {
        let fetcher = ScriptedFetcher::new(vec![
            vec![user(1, "adams"), user(2, "baker")],
            vec![user(3, "cole")],
        ]);
        let mut handle = Producer::new(Side::Relational, 2, 2, fetcher)
            .unwrap()
            .spawn();

        let mut ids = Vec::new();
        loop {
            match handle.dequeue(TIMEOUT).await {
                Dequeued::Record(record) => ids.push(record.id),
                Dequeued::Closed => break,
                Dequeued::TimedOut => panic!("producer stalled"),
            }
        }

        assert_eq!(ids, vec![1, 2, 3]);

        let stats = handle.wait().await.unwrap();
        assert_eq!(
            stats,
            ProducerStats {
                batches_fetched: 2,
                records_enqueued: 3,
                records_skipped: 0,
            }
        );
    }

    #[tokio::test]
    async fn records_before_the_start_key_are_skipped() {
        let fetcher = ScriptedFetcher::new(vec![vec![
            user(1, "Adams"),
            user(2, "Baker"),
            user(3, "cole"),
        ]]);
        let mut producer = Producer::new(Side::Relational, 10, 10, fetcher).unwrap();
        producer.set_start_key(LastnameKey::new("baker"));
        let mut handle = producer.spawn();

        assert!(matches!(handle.dequeue(TIMEOUT).await, Dequeued::Record(r) if r.id == 2));
        assert!(matches!(handle.dequeue(TIMEOUT).await, Dequeued::Record(r) if r.id == 3));
        assert_eq!(handle.dequeue(TIMEOUT).await, Dequeued::Closed);

        let stats = handle.wait().await.unwrap();
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.records_enqueued, 2);
    }

    #[tokio::test]
    async fn stop_unblocks_a_full_queue_and_discards_buffered_records() {
        let batch = (0..10).map(|id| user(id, "adams")).collect();
        let fetcher = ScriptedFetcher::new(vec![batch]);
        let mut handle = Producer::new(Side::Remote, 3, 10, fetcher).unwrap().spawn();

        assert!(matches!(handle.dequeue(TIMEOUT).await, Dequeued::Record(_)));
        // Let the producer refill the queue and block on the next push.
        while handle.rx.len() < 3 {
            tokio::task::yield_now().await;
        }

        assert_eq!(handle.stop(), 3);
        assert_eq!(handle.stop(), 0);

        let stats = handle.wait().await.unwrap();
        assert!(stats.records_enqueued >= 4);
        assert!(stats.records_enqueued < 10);
    }

    #[tokio::test]
    async fn source_faults_surface_through_wait() {
        let mut fetcher = ScriptedFetcher::new(vec![vec![user(1, "adams")]]);
        fetcher.fail_at_end = true;
        let mut handle = Producer::new(Side::Relational, 10, 10, fetcher)
            .unwrap()
            .spawn();

        assert!(matches!(handle.dequeue(TIMEOUT).await, Dequeued::Record(_)));
        assert_eq!(handle.dequeue(TIMEOUT).await, Dequeued::Closed);

        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    }

    struct PendingFetcher;

    impl BatchFetcher for PendingFetcher {
        type Record = RelationalRecord;

        async fn fetch_next(&mut self, _limit: usize) -> ReconcileResult<Vec<RelationalRecord>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_times_out_on_a_stalled_source_and_stop_ends_the_task() {
        let mut handle = Producer::new(Side::Remote, 10, 10, PendingFetcher)
            .unwrap()
            .spawn();

        assert_eq!(
            handle.dequeue(Duration::from_secs(20)).await,
            Dequeued::TimedOut
        );

        let stats = handle.wait().await.unwrap();
        assert_eq!(stats, ProducerStats::default());
    }
}
