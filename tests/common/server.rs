//! Mock item API and configuration helpers

use hn_crawl::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Payload the mock server returns for `id`
pub fn payload(id: i64) -> String {
    format!("{{\"id\":{id},\"type\":\"story\",\"title\":\"item-{id}\"}}")
}

/// Start a server answering `maxitem.json` with `max` and every id in
/// `1..=max` with [`payload`]
pub async fn start_item_api(max: i64) -> MockServer {
    let server = MockServer::start().await;
    mount_max_item(&server, &max.to_string()).await;
    for id in 1..=max {
        mount_item(&server, id, &payload(id)).await;
    }
    server
}

/// Answer `maxitem.json` with a raw body
pub async fn mount_max_item(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/v0/maxitem.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Answer `item/{id}.json` with a raw body
pub async fn mount_item(server: &MockServer, id: i64, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v0/item/{id}.json")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Fail `item/{id}.json` with `status` for the first `times` requests
///
/// Must be mounted before the succeeding mock for the same id.
pub async fn mount_item_failures(server: &MockServer, id: i64, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v0/item/{id}.json")))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

/// Config pointing at `server` with all outputs under `dir` and fast retries
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.base_url = format!("{}/v0/", server.uri());
    config.source.request_timeout = Duration::from_secs(5);
    config.crawl.workers = 8;
    config.crawl.queue_capacity = 4;
    config.crawl.progress_interval = 2;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.jitter = false;
    config.output.database_path = dir.join("hn.db");
    config.output.export_path = dir.join("hn.json");
    config.output.update_path = dir.join("week.json");
    config
}

/// Lines of a file, sorted
pub fn sorted_lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}
