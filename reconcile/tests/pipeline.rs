#![cfg(feature = "test-utils")]

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reconcile::error::{ErrorKind, FaultCategory};
use reconcile::merger::Termination;
use reconcile::pipeline::Pipeline;
use reconcile::sink::memory::MemoryMatchStore;
use reconcile::source::memory::{MemoryDirectory, MemoryUserTable};
use reconcile::source::{DirectoryUser, EMPTY_PAGE_NUMBER};
use reconcile::test_utils::source::FailingSource;
use reconcile::test_utils::store::FailingMatchStore;
use reconcile::test_utils::{
    NISTLER_RELATIONAL_KYLE_ID, NISTLER_REMOTE_KYLE_ID, directory_user, match_record,
    nistler_directory_users, nistler_table_users, relational_user, report_date,
};
use reconcile::types::{FullNameKey, LastnameKey, RelationalRecord};
use reconcile_config::shared::PipelineConfig;
use reconcile_telemetry::tracing::init_test_tracing;

fn pipeline_config() -> PipelineConfig {
    let mut config = PipelineConfig::new(report_date());
    config.remote.capacity = 4;
    config.relational.capacity = 4;
    config.relational.batch_fetch_size = 3;
    config.batch.max_size = 2;

    config
}

fn directory(users: Vec<DirectoryUser>) -> MemoryDirectory {
    MemoryDirectory::new(users, 3)
}

#[tokio::test(flavor = "multi_thread")]
async fn nistler_population_yields_exactly_the_kyle_match() {
    init_test_tracing();

    let mut remote = vec![directory_user(1, "Ann", "Adams")];
    remote.extend(nistler_directory_users());
    remote.push(directory_user(2, "Zoe", "Zimmer"));

    let mut relational = vec![relational_user(10, "Bob", "Baker")];
    relational.extend(nistler_table_users());

    let store = MemoryMatchStore::new();
    let summary = Pipeline::new(
        pipeline_config(),
        directory(remote),
        MemoryUserTable::new(relational),
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].relational_user_id, NISTLER_RELATIONAL_KYLE_ID);
    assert_eq!(records[0].remote_user_id, NISTLER_REMOTE_KYLE_ID);
    assert_eq!(records[0].report_date, report_date());
    assert_eq!(
        (
            records[0].location_match,
            records[0].specialty_match,
            records[0].classification_match
        ),
        (1, 1, 1)
    );
    assert_eq!(records[0].is_relational_user_active, 1);
    assert_eq!((records[0].remote_page, records[0].remote_row), (1, 3));

    assert_eq!(summary.merge.groups_emitted, 1);
    assert_eq!(summary.merge.termination, Termination::RelationalExhausted);
    assert_eq!(summary.engine.matches, 1);
    assert_eq!(summary.collector.matches(), 1);
    assert_eq!(summary.collector.samples().len(), 1);
    assert!(
        summary
            .collector
            .render_summary()
            .unwrap()
            .contains("Total Matches: 1")
    );
}

const LASTNAMES: &[&str] = &[
    "Abbott", "baker", "Cole", "Dunn", "evans", "Fisher", "Grant", "Hughes", "Ibarra", "Jones",
    "Khan", "lopez", "Moore", "Nistler", "Ortiz",
];
const FIRSTNAMES: &[&str] = &["Ann", "Bob", "Cara", "Dan", "Eve", "Finn", "Gus", "Hal"];

/// Present on both sides of every shared lastname so each shared group writes at least one row.
const PAIRED_FIRSTNAME: &str = "Pat";

/// Builds a remote and a relational population over a random subset of lastnames, both sorted,
/// with unique full names on the relational side.
fn random_populations(rng: &mut StdRng) -> (Vec<DirectoryUser>, Vec<RelationalRecord>) {
    let mut remote = Vec::new();
    let mut relational = Vec::new();
    let mut next_id = 1;

    for lastname in LASTNAMES {
        let remote_count = rng.gen_range(0..4);
        for _ in 0..remote_count {
            let firstname = FIRSTNAMES[rng.gen_range(0..FIRSTNAMES.len())];
            remote.push(directory_user(next_id, firstname, lastname));
            next_id += 1;
        }

        let mut firstnames = BTreeSet::new();
        for _ in 0..rng.gen_range(0..4) {
            firstnames.insert(FIRSTNAMES[rng.gen_range(0..FIRSTNAMES.len())]);
        }

        let shared = remote_count > 0 && !firstnames.is_empty();
        if shared || rng.gen_bool(0.3) {
            remote.push(directory_user(next_id, PAIRED_FIRSTNAME, lastname));
            next_id += 1;
            firstnames.insert(PAIRED_FIRSTNAME);
        }

        for firstname in firstnames {
            relational.push(relational_user(next_id, firstname, lastname));
            next_id += 1;
        }
    }

    remote.sort_by_key(|user| LastnameKey::new(&user.lastname));

    (remote, relational)
}

#[tokio::test(flavor = "multi_thread")]
async fn matches_equal_the_full_name_join_in_ascending_lastname_order() {
    init_test_tracing();

    let mut rng = StdRng::seed_from_u64(0x5EED);

    for _ in 0..20 {
        let (remote, relational) = random_populations(&mut rng);

        let relational_by_name: HashMap<FullNameKey, &RelationalRecord> = relational
            .iter()
            .map(|user| (FullNameKey::new(&user.firstname, &user.lastname), user))
            .collect();
        let mut expected: Vec<(u64, u64)> = remote
            .iter()
            .filter_map(|user| {
                relational_by_name
                    .get(&FullNameKey::new(&user.firstname, &user.lastname))
                    .map(|matched| (matched.id, user.id))
            })
            .collect();
        expected.sort_unstable();

        let remote_keys: BTreeSet<LastnameKey> = remote
            .iter()
            .map(|user| LastnameKey::new(&user.lastname))
            .collect();
        let relational_keys: BTreeSet<LastnameKey> = relational
            .iter()
            .map(|user| LastnameKey::new(&user.lastname))
            .collect();
        let shared_keys: Vec<&LastnameKey> =
            remote_keys.intersection(&relational_keys).collect();

        let lastname_of: HashMap<u64, LastnameKey> = relational
            .iter()
            .map(|user| (user.id, LastnameKey::new(&user.lastname)))
            .collect();

        let store = MemoryMatchStore::new();
        let summary = Pipeline::new(
            pipeline_config(),
            directory(remote),
            MemoryUserTable::new(relational.clone()),
            store.clone(),
        )
        .run()
        .await
        .unwrap();

        let records = store.records().await;

        let mut written_keys: Vec<&LastnameKey> = records
            .iter()
            .map(|record| &lastname_of[&record.relational_user_id])
            .collect();
        written_keys.dedup();
        assert_eq!(written_keys, shared_keys);

        let mut actual: Vec<(u64, u64)> = records
            .iter()
            .map(|record| (record.relational_user_id, record.remote_user_id))
            .collect();
        actual.sort_unstable();

        assert_eq!(actual, expected);
        assert_eq!(summary.engine.matches, expected.len() as u64);
        assert_eq!(summary.merge.groups_emitted, shared_keys.len() as u64);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_relational_full_name_aborts_without_writing() {
    init_test_tracing();

    let remote = nistler_directory_users();
    let mut relational = nistler_table_users();
    relational.push(relational_user(916999, "KYLE ", "nistler"));

    let store = MemoryMatchStore::new();
    let err = Pipeline::new(
        pipeline_config(),
        directory(remote),
        MemoryUserTable::new(relational),
        store.clone(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateMatchKey);
    assert_eq!(err.category(), FaultCategory::DataIntegrity);
    assert!(store.records().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn dry_run_reports_matches_without_writing() {
    init_test_tracing();

    let mut config = pipeline_config();
    config.dry_run = true;
    config.delete_existing = true;

    let store = MemoryMatchStore::new();
    store.seed(None, vec![match_record(1)]).await;

    let summary = Pipeline::new(
        config,
        directory(nistler_directory_users()),
        MemoryUserTable::new(nistler_table_users()),
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.engine.matches, 1);
    assert_eq!(summary.engine.sink.flushes, 1);
    assert_eq!(summary.engine.sink.records_written, 1);
    assert!(store.bulk_writes().await.is_empty());
    assert_eq!(store.records().await, vec![match_record(1)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_existing_purges_only_the_own_partition() {
    init_test_tracing();

    let mut config = pipeline_config();
    config.delete_existing = true;
    config.partition_id = Some(1);

    let store = MemoryMatchStore::new();
    store.seed(Some(1), vec![match_record(1)]).await;
    store.seed(Some(2), vec![match_record(2)]).await;

    let summary = Pipeline::new(
        config,
        directory(nistler_directory_users()),
        MemoryUserTable::new(nistler_table_users()),
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.engine.sink.records_purged, 1);

    let rows = store.rows().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].partition_id, 2);
    assert_eq!(rows[1].partition_id, 1);
    assert_eq!(rows[1].record.remote_user_id, NISTLER_REMOTE_KYLE_ID);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_directory_never_queries_the_user_table() {
    init_test_tracing();

    let table = MemoryUserTable::new(nistler_table_users());
    let store = MemoryMatchStore::new();

    let summary = Pipeline::new(
        pipeline_config(),
        directory(Vec::new()),
        table.clone(),
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.merge.termination, Termination::RemoteEmpty);
    assert_eq!(summary.merge.relational_stats, None);
    assert!(table.queries().await.is_empty());
    assert!(store.records().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn working_data_percent_sizes_queues_from_the_populations() {
    init_test_tracing();

    let mut config = pipeline_config();
    config.remote.working_data_percent = Some(10);
    config.relational.working_data_percent = Some(50);

    let directory = directory(nistler_directory_users());
    let store = MemoryMatchStore::new();

    let summary = Pipeline::new(
        config,
        directory.clone(),
        MemoryUserTable::new(nistler_table_users()),
        store.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.engine.matches, 1);
    assert_eq!(directory.requested_pages().await[0], EMPTY_PAGE_NUMBER);
}

#[tokio::test(flavor = "multi_thread")]
async fn source_faults_abort_the_run() {
    init_test_tracing();

    let store = MemoryMatchStore::new();
    let err = Pipeline::new(
        pipeline_config(),
        directory(nistler_directory_users()),
        FailingSource::new(MemoryUserTable::new(nistler_table_users()), 0),
        store.clone(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert_eq!(err.category(), FaultCategory::SourceFetch);
    assert!(store.records().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn sink_faults_abort_the_run() {
    init_test_tracing();

    let mut config = pipeline_config();
    config.batch.max_size = 1;

    let err = Pipeline::new(
        config,
        directory(nistler_directory_users()),
        MemoryUserTable::new(nistler_table_users()),
        FailingMatchStore,
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SinkWriteFailed);
    assert_eq!(err.category(), FaultCategory::SinkWrite);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_configuration_is_rejected_before_any_fetch() {
    init_test_tracing();

    let mut config = pipeline_config();
    config.relational.capacity = 0;

    let directory = directory(nistler_directory_users());
    let err = Pipeline::new(
        config,
        directory.clone(),
        MemoryUserTable::new(nistler_table_users()),
        MemoryMatchStore::new(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(directory.requested_pages().await.is_empty());
}
