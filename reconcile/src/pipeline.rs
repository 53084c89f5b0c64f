use reconcile_config::shared::{PipelineConfig, QueueConfig};
use tracing::{Instrument, info};

use crate::collector::MetricsCollector;
use crate::engine::{EngineSummary, MatchEngine};
use crate::error::ReconcileResult;
use crate::merger::{MergeSummary, StreamMerger};
use crate::sink::{BatchSink, MatchStore};
use crate::source::{DIRECTORY_PAGE_SIZE, DirectorySource, RelationalSource};
use crate::types::ReportContext;
use crate::workers::{DirectoryPager, KeysetScanner, Producer, Side, working_set_capacity};

/// Share of the relational working set used as queue capacity. The rest is the fetch size.
const RELATIONAL_QUEUE_SHARE_PERCENT: usize = 20;

/// Everything reported at the end of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    pub merge: MergeSummary,
    pub engine: EngineSummary,
    pub collector: MetricsCollector,
}

/// Queue capacity and fetch size of one producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueSizing {
    capacity: usize,
    batch_fetch_size: usize,
}

impl From<&QueueConfig> for QueueSizing {
    fn from(config: &QueueConfig) -> Self {
        Self {
            capacity: config.capacity,
            batch_fetch_size: config.batch_fetch_size,
        }
    }
}

/// Splits a relational working set between the queue and the fetch size, both at least 1.
fn split_relational_working_set(total: usize) -> QueueSizing {
    let capacity = (total * RELATIONAL_QUEUE_SHARE_PERCENT / 100).max(1);
    let batch_fetch_size = total.saturating_sub(capacity).max(1);

    QueueSizing {
        capacity,
        batch_fetch_size,
    }
}

/// Composition root of one reconciliation run.
///
/// Wires a directory source, a relational source and a match store into two producers, the
/// stream merger, the match engine and the batch sink, then runs everything to completion.
#[derive(Debug)]
pub struct Pipeline<D, R, S> {
    config: PipelineConfig,
    directory: D,
    relational: R,
    store: S,
}

impl<D, R, S> Pipeline<D, R, S>
where
    D: DirectorySource + 'static,
    R: RelationalSource + 'static,
    S: MatchStore,
{
    pub fn new(config: PipelineConfig, directory: D, relational: R, store: S) -> Self {
        Self {
            config,
            directory,
            relational,
            store,
        }
    }

    /// Runs the reconciliation.
    ///
    /// Any fault aborts the run: the pending sink buffer is not flushed and no summary is
    /// returned.
    pub async fn run(self) -> ReconcileResult<RunSummary> {
        let span = tracing::info_span!(
            "pipeline",
            report_date = %self.config.report_date,
            partition_id = self.config.partition_id
        );

        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> ReconcileResult<RunSummary> {
        let Self {
            config,
            directory,
            relational,
            store,
        } = self;

        config.validate()?;

        // The collector times the whole run, including purge and queue sizing.
        let collector = MetricsCollector::new();

        info!(
            directory = D::name(),
            relational = R::name(),
            store = S::name(),
            dry_run = config.dry_run,
            "starting reconciliation"
        );

        let mut sink = BatchSink::new(store, &config.batch, config.dry_run, config.partition_id)?;
        if config.delete_existing {
            sink.purge_for_report_date(config.report_date).await?;
        }

        let remote_sizing = remote_sizing(&config.remote, &directory).await?;
        let relational_sizing = relational_sizing(&config.relational, &relational).await?;

        let remote = Producer::new(
            Side::Remote,
            remote_sizing.capacity,
            remote_sizing.batch_fetch_size,
            DirectoryPager::new(directory, &config.page_range),
        )?;
        let relational = Producer::new(
            Side::Relational,
            relational_sizing.capacity,
            relational_sizing.batch_fetch_size,
            KeysetScanner::new(relational),
        )?;

        let mut engine = MatchEngine::new(ReportContext::new(config.report_date), sink, collector);

        let merger = StreamMerger::new(
            remote,
            relational,
            config.remote.timeout(),
            config.relational.timeout(),
        );
        let merge = merger.run(&mut engine).await?;

        let (engine, mut collector) = engine.finish().await?;
        collector.mark_end();

        info!(
            groups = merge.groups_emitted,
            matches = engine.matches,
            termination = %merge.termination,
            "reconciliation finished"
        );

        Ok(RunSummary {
            merge,
            engine,
            collector,
        })
    }
}

async fn remote_sizing<D>(config: &QueueConfig, directory: &D) -> ReconcileResult<QueueSizing>
where
    D: DirectorySource,
{
    let Some(percent) = config.working_data_percent else {
        return Ok(QueueSizing::from(config));
    };

    let pages = directory.page_count().await?;
    let capacity = working_set_capacity(pages as u64 * DIRECTORY_PAGE_SIZE, percent)?;
    info!(pages, capacity, "sized remote queue from directory population");

    Ok(QueueSizing {
        capacity,
        batch_fetch_size: config.batch_fetch_size,
    })
}

async fn relational_sizing<R>(config: &QueueConfig, relational: &R) -> ReconcileResult<QueueSizing>
where
    R: RelationalSource,
{
    let Some(percent) = config.working_data_percent else {
        return Ok(QueueSizing::from(config));
    };

    let count = relational.record_count().await?;
    let sizing = split_relational_working_set(working_set_capacity(count, percent)?);
    info!(
        count,
        capacity = sizing.capacity,
        batch_fetch_size = sizing.batch_fetch_size,
        "sized relational queue from table population"
    );

    Ok(sizing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relational_working_set_is_split_between_queue_and_fetch() {
        assert_eq!(
            split_relational_working_set(20_000),
            QueueSizing {
                capacity: 4_000,
                batch_fetch_size: 16_000
            }
        );
        assert_eq!(
            split_relational_working_set(1),
            QueueSizing {
                capacity: 1,
                batch_fetch_size: 1
            }
        );
    }
}
