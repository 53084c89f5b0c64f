#![cfg(feature = "test-utils")]

use std::time::Duration;

use reconcile::collector::MetricsCollector;
use reconcile::engine::MatchEngine;
use reconcile::error::ErrorKind;
use reconcile::merger::{StreamMerger, Termination};
use reconcile::sink::BatchSink;
use reconcile::sink::memory::MemoryMatchStore;
use reconcile::source::memory::{MemoryDirectory, MemoryUserTable};
use reconcile::source::{DirectorySource, DirectoryUser, RelationalSource};
use reconcile::test_utils::source::StallingSource;
use reconcile::test_utils::{directory_user, relational_user, report_date};
use reconcile::types::{RelationalRecord, ReportContext};
use reconcile::workers::{DirectoryPager, KeysetScanner, Producer, Side};
use reconcile_config::shared::{BatchConfig, PageRangeConfig};
use reconcile_telemetry::tracing::init_test_tracing;

const TIMEOUT: Duration = Duration::from_secs(20);

fn engine(store: &MemoryMatchStore) -> MatchEngine<MemoryMatchStore, MetricsCollector> {
    let sink = BatchSink::new(store.clone(), &BatchConfig::default(), false, None).unwrap();

    MatchEngine::new(ReportContext::new(report_date()), sink, MetricsCollector::new())
}

fn merger<D, R>(
    directory: D,
    table: R,
    relational_batch_size: usize,
) -> StreamMerger<DirectoryPager<D>, KeysetScanner<R>>
where
    D: DirectorySource + 'static,
    R: RelationalSource + 'static,
{
    let remote = Producer::new(
        Side::Remote,
        10,
        10,
        DirectoryPager::new(directory, &PageRangeConfig::default()),
    )
    .unwrap();
    let relational = Producer::new(
        Side::Relational,
        10,
        relational_batch_size,
        KeysetScanner::new(table),
    )
    .unwrap();

    StreamMerger::new(remote, relational, TIMEOUT, TIMEOUT)
}

fn remote_users(names: &[(u64, &str, &str)]) -> Vec<DirectoryUser> {
    names
        .iter()
        .map(|(id, firstname, lastname)| directory_user(*id, firstname, lastname))
        .collect()
}

fn table_users(names: &[(u64, &str, &str)]) -> Vec<RelationalRecord> {
    names
        .iter()
        .map(|(id, firstname, lastname)| relational_user(*id, firstname, lastname))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn remote_timeout_while_aligning_drains_without_more_groups() {
    init_test_tracing();

    // Page 1 is served, page 2 never answers.
    let directory = StallingSource::new(
        MemoryDirectory::new(
            remote_users(&[
                (1, "Ann", "Adams"),
                (2, "Bob", "Baker"),
                (3, "Kyle", "Nistler"),
            ]),
            2,
        ),
        1,
    );
    let table = MemoryUserTable::new(table_users(&[
        (10, "Cara", "Cole"),
        (11, "Kyle", "Nistler"),
    ]));

    let store = MemoryMatchStore::new();
    let mut engine = engine(&store);

    let summary = merger(directory.clone(), table, 10)
        .run(&mut engine)
        .await
        .unwrap();

    assert_eq!(summary.termination, Termination::RemoteExhausted);
    assert_eq!(summary.groups_emitted, 0);
    assert_eq!(summary.remote_records, 2);
    assert!(summary.relational_stats.is_some());
    assert_eq!(directory.calls(), 2);

    let (engine_summary, _) = engine.finish().await.unwrap();
    assert_eq!(engine_summary.matches, 0);
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn out_of_order_remote_records_are_merged_without_resorting() {
    init_test_tracing();

    // Baker arrives after Nistler, once the relational side has already moved past it.
    let directory = MemoryDirectory::new(
        remote_users(&[
            (1, "Ann", "Adams"),
            (2, "Kyle", "Nistler"),
            (3, "Bob", "Baker"),
            (4, "Zoe", "Zimmer"),
        ]),
        10,
    );
    let table = MemoryUserTable::new(table_users(&[
        (10, "Bob", "Baker"),
        (11, "Kyle", "Nistler"),
        (12, "Zoe", "Zimmer"),
    ]));

    let store = MemoryMatchStore::new();
    let mut engine = engine(&store);

    let summary = merger(directory, table, 10).run(&mut engine).await.unwrap();

    assert_eq!(summary.termination, Termination::RemoteExhausted);
    assert_eq!(summary.groups_emitted, 2);
    assert_eq!(summary.remote_records, 4);

    engine.finish().await.unwrap();
    let pairs: Vec<(u64, u64)> = store
        .records()
        .await
        .iter()
        .map(|record| (record.relational_user_id, record.remote_user_id))
        .collect();
    assert_eq!(pairs, vec![(11, 2), (12, 4)]);
}

#[tokio::test(start_paused = true)]
async fn relational_timeout_while_grouping_delivers_the_group_then_drains() {
    init_test_tracing();

    let directory = MemoryDirectory::new(
        remote_users(&[(1, "Kyle", "Nistler"), (2, "Zoe", "Zimmer")]),
        10,
    );
    // The first batch of two is served, the second never answers.
    let table = StallingSource::new(
        MemoryUserTable::new(table_users(&[
            (10, "Judy", "Nistler"),
            (11, "Kyle", "Nistler"),
            (12, "Zoe", "Zimmer"),
        ])),
        1,
    );

    let store = MemoryMatchStore::new();
    let mut engine = engine(&store);

    let summary = merger(directory, table, 2).run(&mut engine).await.unwrap();

    assert_eq!(summary.termination, Termination::RelationalExhausted);
    assert_eq!(summary.groups_emitted, 1);
    assert_eq!(summary.relational_records, 2);

    engine.finish().await.unwrap();
    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!((records[0].relational_user_id, records[0].remote_user_id), (11, 1));
}

#[tokio::test]
async fn relational_start_key_is_the_first_remote_lastname() {
    init_test_tracing();

    let directory = MemoryDirectory::new(
        remote_users(&[(1, "Kyle", "Nistler"), (2, "Zoe", "Zimmer")]),
        10,
    );
    let table = MemoryUserTable::new(table_users(&[
        (10, "Ann", "Adams"),
        (11, "Bob", "Baker"),
        (12, "Kyle", "Nistler"),
        (13, "Zoe", "Zimmer"),
    ]));

    let store = MemoryMatchStore::new();
    let mut engine = engine(&store);

    let summary = merger(directory, table.clone(), 10)
        .run(&mut engine)
        .await
        .unwrap();

    assert_eq!(summary.groups_emitted, 2);
    assert_eq!(summary.relational_records, 2);
    assert_eq!(table.queries().await[0].lastname, "nistler");

    let (engine_summary, _) = engine.finish().await.unwrap();
    assert_eq!(engine_summary.matches, 2);
}

#[tokio::test]
async fn empty_remote_side_never_starts_the_relational_producer() {
    init_test_tracing();

    let table = MemoryUserTable::new(table_users(&[(10, "Kyle", "Nistler")]));
    let store = MemoryMatchStore::new();
    let mut engine = engine(&store);

    let summary = merger(MemoryDirectory::new(Vec::new(), 10), table.clone(), 10)
        .run(&mut engine)
        .await
        .unwrap();

    assert_eq!(summary.termination, Termination::RemoteEmpty);
    assert_eq!(summary.relational_stats, None);
    assert!(table.queries().await.is_empty());
}

#[tokio::test]
async fn engine_faults_stop_both_producers_and_surface() {
    init_test_tracing();

    let directory = MemoryDirectory::new(
        remote_users(&[(1, "Kyle", "Nistler"), (2, "Zoe", "Zimmer")]),
        10,
    );
    let table = MemoryUserTable::new(table_users(&[
        (10, "Kyle", "Nistler"),
        (11, "kyle", "NISTLER"),
        (12, "Zoe", "Zimmer"),
    ]));

    let store = MemoryMatchStore::new();
    let mut engine = engine(&store);

    let err = merger(directory, table, 10)
        .run(&mut engine)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateMatchKey);
    assert!(err.errors().is_none());
    assert_eq!(engine.summary().matches, 0);
}
