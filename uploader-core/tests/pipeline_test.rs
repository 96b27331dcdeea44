use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use pricing::{EndpointError, Environment, Submission};
use tokio_util::sync::CancellationToken;
use uploader_core::{
    calendar::TradeDatePolicy,
    settings::{DestinationSettings, UploadSettings},
    shared_source,
    testkit::{instrument, raw, FakeConnector, FixedClock, RecordingSink, Scripted, StaticSource},
    Destination, Orchestrator,
};

// --- 1. Fixtures ---

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// Friday
fn today() -> NaiveDate {
    ymd(2018, 7, 20)
}

fn trade_date() -> NaiveDate {
    ymd(2018, 7, 19)
}

fn strip() -> NaiveDate {
    ymd(2018, 9, 1)
}

fn endpoint() -> FakeConnector {
    let connector = FakeConnector::new();
    connector.set_catalog(vec![instrument("BRN"), instrument("LO")]);
    connector
}

fn upload_settings(policy: TradeDatePolicy) -> UploadSettings {
    UploadSettings {
        trade_date_policy: policy,
        ..UploadSettings::default()
    }
}

struct Harness {
    orchestrator: Orchestrator,
    primary: FakeConnector,
    secondary: FakeConnector,
    sink: Arc<RecordingSink>,
    cancel: CancellationToken,
}

fn harness(upload: UploadSettings, sources: Vec<StaticSource>, today: NaiveDate) -> Harness {
    let primary = endpoint();
    let secondary = endpoint();
    let sink = Arc::new(RecordingSink::new());
    let cancel = CancellationToken::new();

    let destinations = vec![
        Destination::new(
            DestinationSettings::new(Environment::Production, true),
            Arc::new(primary.clone()),
        ),
        Destination::new(
            DestinationSettings::new(Environment::Test, false),
            Arc::new(secondary.clone()),
        ),
    ];
    let orchestrator = Orchestrator::new(
        upload,
        sources.into_iter().map(shared_source).collect(),
        destinations,
        sink.clone(),
        Arc::new(FixedClock::on(today)),
        cancel.clone(),
    )
    .unwrap();

    Harness {
        orchestrator,
        primary,
        secondary,
        sink,
        cancel,
    }
}

fn record_counts(submissions: &[Submission]) -> Vec<usize> {
    submissions.iter().map(Submission::record_count).collect()
}

fn trade_dates(submission: &Submission) -> Vec<NaiveDate> {
    match submission {
        Submission::Standard(rows) => rows.iter().map(|r| r.trade_date).collect(),
        Submission::Bulk(_) => Vec::new(),
    }
}

// --- 2. Tests ---

#[tokio::test]
async fn test_valid_records_are_sent_to_every_destination() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let nymex = StaticSource::new("Nymex Option File", vec![raw("LO", trade_date(), strip())]);
    let (ice_log, nymex_log) = (ice.outcome_log(), nymex.outcome_log());

    let mut h = harness(
        upload_settings(TradeDatePolicy::AsInFile),
        vec![ice, nymex],
        today(),
    );
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(record_counts(&h.primary.submissions()), vec![2]);
    assert_eq!(record_counts(&h.secondary.submissions()), vec![2]);
    // lookups only ever go to the primary
    assert_eq!(h.primary.catalog_fetches(), 1);
    assert_eq!(h.secondary.catalog_fetches(), 0);
    assert_eq!(h.secondary.holiday_lookups(), 0);

    assert_eq!(ice_log.outcomes(), vec![true]);
    assert_eq!(nymex_log.outcomes(), vec![true]);

    let mut messages = h.sink.messages();
    messages.sort_by_key(|(_, is_primary)| !*is_primary);
    assert_eq!(messages.len(), 2);
    for (text, _) in &messages {
        assert!(text.starts_with(
            "Upload of ICE Dat file, Nymex Option File option settlement prices to"
        ));
        assert!(text.contains("\n2 successes, 0 ignored, 0 failures\n"));
    }
    assert!(messages[0].1);
    assert!(messages[0].0.contains("to Production completed at"));
    assert!(!messages[1].1);
    assert!(messages[1].0.contains("to Test completed at"));
    assert!(h.sink.is_closed());
}

#[tokio::test]
async fn test_as_in_file_and_today_uploads_each_record_twice() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);

    let mut h = harness(
        upload_settings(TradeDatePolicy::AsInFileAndToday),
        vec![ice],
        today(),
    );
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    for connector in [&h.primary, &h.secondary] {
        let submissions = connector.submissions();
        assert_eq!(submissions.len(), 1);
        let mut dates = trade_dates(&submissions[0]);
        dates.sort();
        assert_eq!(dates, vec![trade_date(), today()]);
    }
}

#[tokio::test]
async fn test_stale_batches_are_not_uploaded() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let log = ice.outcome_log();

    // Wednesday after: the cutoff is Tuesday
    let mut h = harness(
        upload_settings(TradeDatePolicy::AsInFile),
        vec![ice],
        ymd(2018, 7, 25),
    );
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(h.primary.catalog_fetches(), 1);
    assert!(h.primary.submissions().is_empty());
    assert!(h.secondary.submissions().is_empty());
    assert_eq!(log.outcomes(), vec![false]);
    assert!(h.sink.messages().is_empty());
}

#[tokio::test]
async fn test_stale_batches_are_uploaded_when_forced() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let log = ice.outcome_log();
    let upload = UploadSettings {
        force_upload_old_trade_dates: true,
        ..upload_settings(TradeDatePolicy::AsInFile)
    };

    let mut h = harness(upload, vec![ice], ymd(2018, 7, 25));
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(record_counts(&h.primary.submissions()), vec![1]);
    assert_eq!(log.outcomes(), vec![true]);
}

#[tokio::test]
async fn test_failed_primary_delivery_reports_failure() {
    let ice = StaticSource::new(
        "ICE Dat file",
        vec![
            raw("BRN", trade_date(), strip()),
            raw("LO", trade_date(), strip()),
        ],
    );
    let log = ice.outcome_log();

    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.primary.reject_instrument("LO", "Unknown strike");
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(log.outcomes(), vec![false]);
    let primary_message = h
        .sink
        .messages()
        .into_iter()
        .find(|(_, is_primary)| *is_primary)
        .unwrap();
    assert!(primary_message.0.contains("1 successes, 0 ignored, 1 failures"));
}

#[tokio::test]
async fn test_successful_files_stay_put_unless_marked_processed() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let log = ice.outcome_log();
    let upload = UploadSettings {
        mark_processed_once_uploaded: false,
        ..upload_settings(TradeDatePolicy::AsInFile)
    };

    let mut h = harness(upload, vec![ice], today());
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(record_counts(&h.primary.submissions()), vec![1]);
    assert!(log.outcomes().is_empty());
}

#[tokio::test]
async fn test_cleanup_failures_do_not_fail_the_delivery() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())])
        .with_failing_cleanup();
    let log = ice.outcome_log();

    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(log.outcomes(), vec![true]);
    assert_eq!(h.sink.messages().len(), 2);
}

#[tokio::test]
async fn test_throttles_limit_each_source() {
    let records = (0..5).map(|_| raw("BRN", trade_date(), strip())).collect();
    let ice = StaticSource::new("ICE Dat file", records);
    let upload = UploadSettings {
        records_to_skip: 1,
        max_records: 3,
        ..upload_settings(TradeDatePolicy::AsInFile)
    };

    let mut h = harness(upload, vec![ice], today());
    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(record_counts(&h.primary.submissions()), vec![3]);
}

#[tokio::test]
async fn test_schema_mismatch_on_primary_stops_the_service() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.primary
        .push_submit(Scripted::Fail(EndpointError::SchemaMismatch("unknown field".into())));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        h.orchestrator.run(Duration::from_secs(3600)),
    )
    .await
    .unwrap();

    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert!(err
        .to_string()
        .contains("Unrecoverable pricing endpoint error in primary destination"));
}

#[tokio::test]
async fn test_schema_mismatch_on_secondary_is_contained() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let log = ice.outcome_log();
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.secondary
        .push_submit(Scripted::Fail(EndpointError::SchemaMismatch("unknown field".into())));

    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(log.outcomes(), vec![true]);
    let messages = h.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1);
}

#[tokio::test]
async fn test_catalog_schema_mismatch_is_fatal() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.primary
        .push_catalog(Scripted::Fail(EndpointError::SchemaMismatch("v2".into())));

    let err = h.orchestrator.run_cycle().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_cancelled_run_returns_cleanly() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.cancel.cancel();

    h.orchestrator.run(Duration::from_secs(3600)).await.unwrap();
    h.orchestrator.shutdown().await.unwrap();
    assert!(h.primary.submissions().is_empty());
}

#[tokio::test]
async fn test_invalid_destination_sets_are_rejected() {
    let sink = Arc::new(RecordingSink::new());
    let build = |destinations: Vec<Destination>| {
        Orchestrator::new(
            UploadSettings::default(),
            vec![shared_source(StaticSource::new("ICE Dat file", Vec::new()))],
            destinations,
            sink.clone(),
            Arc::new(FixedClock::on(today())),
            CancellationToken::new(),
        )
    };
    let destination = |environment, is_primary| {
        Destination::new(
            DestinationSettings::new(environment, is_primary),
            Arc::new(endpoint()),
        )
    };

    assert!(build(Vec::new()).is_err());
    assert!(build(vec![destination(Environment::Test, false)]).is_err());
    assert!(build(vec![
        destination(Environment::Test, true),
        destination(Environment::Test, false),
    ])
    .is_err());
    assert!(build(vec![destination(Environment::Test, true)]).is_ok());
}

fn not_found() -> EndpointError {
    EndpointError::Connectivity("The request failed with HTTP status 404: Not Found".into())
}

#[tokio::test]
async fn test_unavailable_secondary_does_not_hold_back_the_primary() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]).repeating();
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    // Retried forever, five minutes apart
    h.secondary.fail_all_submissions(not_found());

    for _ in 0..50 {
        tokio::time::timeout(Duration::from_secs(2), h.orchestrator.run_cycle())
            .await
            .unwrap()
            .unwrap();
    }
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.primary.submissions().len() < 50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(h.primary.submissions().len(), 50);
    assert_eq!(h.secondary.submissions().len(), 1);

    h.cancel.cancel();
    h.orchestrator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_deliveries_still_retrying() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let log = ice.outcome_log();
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.primary.push_submit(Scripted::Fail(not_found()));

    h.orchestrator.run_cycle().await.unwrap();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(record_counts(&h.primary.submissions()), vec![1, 1]);
    assert_eq!(log.outcomes(), vec![true]);
    let messages = h.sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|(text, is_primary)| *is_primary
        && text.contains("1 successes, 0 ignored, 0 failures")));
    assert!(h.sink.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_shutdown_abandons_retrying_deliveries() {
    let ice = StaticSource::new("ICE Dat file", vec![raw("BRN", trade_date(), strip())]);
    let log = ice.outcome_log();
    let mut h = harness(upload_settings(TradeDatePolicy::AsInFile), vec![ice], today());
    h.primary.fail_all_submissions(not_found());

    h.orchestrator.run_cycle().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.cancel.cancel();
    h.orchestrator.shutdown().await.unwrap();

    assert_eq!(h.primary.submissions().len(), 1);
    assert!(log.outcomes().is_empty());
    assert!(h.sink.messages().iter().all(|(_, is_primary)| !*is_primary));
    assert!(h.sink.is_closed());
}
