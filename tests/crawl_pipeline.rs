//! End-to-end runs against a mock item API

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use hn_crawl::{
    Database, Error, ItemId, RunConfig, RunOutcome, SinkKind, SourceError, run,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn crawl_into_table_then_export() {
    let server = start_item_api(12).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let cancel = CancellationToken::new();

    let outcome = run(&config, RunConfig::crawl(), &cancel).await.unwrap();
    let RunOutcome::Crawled(report) = outcome else {
        panic!("expected a crawl report");
    };
    assert_eq!(report.expected, 12);
    assert_eq!(report.persisted, 12);
    assert!(report.is_complete());

    let db = Database::new(&config.output.database_path).await.unwrap();
    assert_eq!(db.count_items().await.unwrap(), 12);
    for id in 1..=12 {
        assert_eq!(
            db.get_item(ItemId(id)).await.unwrap(),
            Some(payload(id)),
            "item {id}"
        );
    }
    db.close().await;

    let outcome = run(&config, RunConfig::export(), &cancel).await.unwrap();
    let RunOutcome::Exported(export) = outcome else {
        panic!("expected an export report");
    };
    assert_eq!(export.lines, 12);

    let exported = std::fs::read_to_string(&config.output.export_path).unwrap();
    let expected: String = (1..=12).map(|id| payload(id) + "\n").collect();
    assert_eq!(exported, expected, "export is ordered by id");
}

#[tokio::test]
async fn resume_writes_each_payload_once() {
    let server = start_item_api(12).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());

    run(&config, RunConfig::resume(ItemId(10)), &CancellationToken::new())
        .await
        .unwrap();

    let mut expected = vec![payload(10), payload(11), payload(12)];
    expected.sort();
    assert_eq!(sorted_lines(&config.output.update_path), expected);
}

#[tokio::test]
async fn recrawl_keeps_first_payload() {
    let server = start_item_api(5).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let cancel = CancellationToken::new();

    run(&config, RunConfig::crawl(), &cancel).await.unwrap();

    // Items 3..=5 change upstream before the second pass
    server.reset().await;
    mount_max_item(&server, "5").await;
    for id in 3..=5 {
        mount_item(&server, id, &format!("{{\"id\":{id},\"edited\":true}}")).await;
    }

    run(&config, RunConfig::resume(ItemId(3)).with_sink(SinkKind::Table), &cancel)
        .await
        .unwrap();

    let db = Database::new(&config.output.database_path).await.unwrap();
    assert_eq!(db.count_items().await.unwrap(), 5);
    for id in 1..=5 {
        assert_eq!(db.get_item(ItemId(id)).await.unwrap(), Some(payload(id)), "item {id}");
    }
    db.close().await;
}

#[tokio::test]
async fn resume_into_table_then_export() {
    let server = start_item_api(12).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let cancel = CancellationToken::new();

    let outcome = run(
        &config,
        RunConfig::resume(ItemId(10)).with_sink(SinkKind::Table),
        &cancel,
    )
    .await
    .unwrap();
    let RunOutcome::Crawled(report) = outcome else {
        panic!("expected a crawl report");
    };
    assert_eq!(report.expected, 3);
    assert_eq!(report.persisted, 3);
    assert!(!config.output.update_path.exists(), "table sink leaves the update file alone");

    let outcome = run(&config, RunConfig::export(), &cancel).await.unwrap();
    let RunOutcome::Exported(export) = outcome else {
        panic!("expected an export report");
    };
    assert_eq!(export.lines, 3);
    assert_eq!(
        std::fs::read_to_string(&config.output.export_path).unwrap(),
        format!("{}\n{}\n{}\n", payload(10), payload(11), payload(12))
    );
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = wiremock::MockServer::start().await;
    mount_max_item(&server, "12").await;
    for id in 1..=12 {
        if id == 11 {
            mount_item_failures(&server, 11, 500, 2).await;
        }
        mount_item(&server, id, &payload(id)).await;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());

    let outcome = run(&config, RunConfig::resume(ItemId(10)), &CancellationToken::new())
        .await
        .unwrap();

    let RunOutcome::Crawled(report) = outcome else {
        panic!("expected a crawl report");
    };
    assert_eq!(report.persisted, 3);

    let lines = sorted_lines(&config.output.update_path);
    assert_eq!(lines.iter().filter(|l| **l == payload(11)).count(), 1);
    assert_eq!(lines.len(), 3);

    // Drop verifies the failing mock was hit exactly twice
    drop(server);
}

#[tokio::test]
async fn error_bodies_are_stored_as_payloads() {
    let server = wiremock::MockServer::start().await;
    mount_max_item(&server, "2").await;
    mount_item(&server, 1, "null").await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/v0/item/2.json"))
        .respond_with(
            wiremock::ResponseTemplate::new(401)
                .set_body_string("{\"error\":\"Permission denied\"}"),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());

    run(&config, RunConfig::crawl(), &CancellationToken::new())
        .await
        .unwrap();

    let db = Database::new(&config.output.database_path).await.unwrap();
    assert_eq!(db.get_item(ItemId(1)).await.unwrap().as_deref(), Some("null"));
    assert_eq!(
        db.get_item(ItemId(2)).await.unwrap().as_deref(),
        Some("{\"error\":\"Permission denied\"}")
    );
    db.close().await;
}

#[tokio::test]
async fn bounded_retry_reports_dead_letters() {
    let server = wiremock::MockServer::start().await;
    mount_max_item(&server, "3").await;
    mount_item(&server, 1, &payload(1)).await;
    mount_item_failures(&server, 2, 503, 3).await;
    mount_item(&server, 3, &payload(3)).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.retry.max_attempts = Some(2);

    let outcome = run(&config, RunConfig::crawl(), &CancellationToken::new())
        .await
        .unwrap();

    let RunOutcome::Crawled(report) = outcome else {
        panic!("expected a crawl report");
    };
    assert_eq!(report.persisted, 2);
    assert_eq!(report.dead_letters.len(), 1);
    assert_eq!(report.dead_letters[0].id, ItemId(2));
    assert_eq!(report.dead_letters[0].attempts, 3);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn invalid_max_item_aborts_run() {
    let server = wiremock::MockServer::start().await;
    mount_max_item(&server, "not a number").await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());

    let result = run(&config, RunConfig::crawl(), &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(Error::Source(SourceError::InvalidMaxItem { .. }))
    ));
}

#[tokio::test]
async fn start_past_max_completes_empty() {
    let server = start_item_api(5).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run(&config, RunConfig::resume(ItemId(6)), &CancellationToken::new()),
    )
    .await
    .expect("empty range must not hang")
    .unwrap();

    let RunOutcome::Crawled(report) = outcome else {
        panic!("expected a crawl report");
    };
    assert_eq!(report.expected, 0);
    assert_eq!(std::fs::read_to_string(&config.output.update_path).unwrap(), "");
}

#[tokio::test]
async fn cancellation_ends_a_stuck_crawl() {
    let server = wiremock::MockServer::start().await;
    mount_max_item(&server, "2").await;
    mount_item(&server, 1, &payload(1)).await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/v0/item/2.json"))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run(&config, RunConfig::resume(ItemId(1)), &cancel),
    )
    .await
    .expect("cancellation must end the run");

    assert!(matches!(
        result,
        Err(Error::Cancelled {
            persisted: 1,
            expected: 2
        })
    ));
    assert_eq!(sorted_lines(&config.output.update_path), vec![payload(1)]);
}
