//! Metric names and registration for reconciliation runs.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

/// Label for the producer side (`remote` or `relational`).
pub const SIDE_LABEL: &str = "side";

/// Label set to `true` when sink writes are skipped.
pub const DRY_RUN_LABEL: &str = "dry_run";

/// Counter for batches fetched from a source.
pub const RECONCILE_BATCHES_FETCHED_TOTAL: &str = "reconcile_batches_fetched_total";

/// Counter for records pushed into a producer queue.
pub const RECONCILE_RECORDS_ENQUEUED_TOTAL: &str = "reconcile_records_enqueued_total";

/// Counter for records dropped because they sort before the start key.
pub const RECONCILE_RECORDS_SKIPPED_TOTAL: &str = "reconcile_records_skipped_total";

/// Counter for buffered records discarded when a producer is stopped.
pub const RECONCILE_RECORDS_DISCARDED_TOTAL: &str = "reconcile_records_discarded_total";

/// Histogram of source fetch latency.
pub const RECONCILE_FETCH_DURATION_SECONDS: &str = "reconcile_fetch_duration_seconds";

/// Counter for lastname groups handed to the match engine.
pub const RECONCILE_GROUPS_TOTAL: &str = "reconcile_groups_total";

/// Counter for emitted match records.
pub const RECONCILE_MATCHES_TOTAL: &str = "reconcile_matches_total";

/// Counter for relational users matched by more than one remote user.
pub const RECONCILE_MULTI_MATCHES_TOTAL: &str = "reconcile_multi_matches_total";

/// Counter for sink flushes.
pub const RECONCILE_SINK_FLUSHES_TOTAL: &str = "reconcile_sink_flushes_total";

/// Counter for match records flushed by the sink.
pub const RECONCILE_SINK_RECORDS_TOTAL: &str = "reconcile_sink_records_total";

static REGISTER_METRICS: Once = Once::new();

/// Registers descriptions for all reconciliation metrics.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            RECONCILE_BATCHES_FETCHED_TOTAL,
            Unit::Count,
            "Batches fetched from a source"
        );
        describe_counter!(
            RECONCILE_RECORDS_ENQUEUED_TOTAL,
            Unit::Count,
            "Records pushed into a producer queue"
        );
        describe_counter!(
            RECONCILE_RECORDS_SKIPPED_TOTAL,
            Unit::Count,
            "Records skipped because they sort before the start key"
        );
        describe_counter!(
            RECONCILE_RECORDS_DISCARDED_TOTAL,
            Unit::Count,
            "Buffered records discarded when a producer was stopped"
        );
        describe_histogram!(
            RECONCILE_FETCH_DURATION_SECONDS,
            Unit::Seconds,
            "Latency of a single source fetch"
        );
        describe_counter!(
            RECONCILE_GROUPS_TOTAL,
            Unit::Count,
            "Lastname groups handed to the match engine"
        );
        describe_counter!(
            RECONCILE_MATCHES_TOTAL,
            Unit::Count,
            "Match records emitted"
        );
        describe_counter!(
            RECONCILE_MULTI_MATCHES_TOTAL,
            Unit::Count,
            "Relational users matched by more than one remote user"
        );
        describe_counter!(
            RECONCILE_SINK_FLUSHES_TOTAL,
            Unit::Count,
            "Bulk flushes performed by the sink"
        );
        describe_counter!(
            RECONCILE_SINK_RECORDS_TOTAL,
            Unit::Count,
            "Match records flushed by the sink"
        );
    });
}
