//! Remote item source
//!
//! The crawler talks to the remote service only through [`ItemSource`], so
//! tests can drive the pipeline with a scripted in-memory source while the
//! binary uses [`HttpItemSource`].

use crate::config::SourceConfig;
use crate::error::{Error, Result, SourceError};
use crate::types::{IdRange, ItemId};
use reqwest::StatusCode;
use url::Url;

/// Read-only access to the remote id space
#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    /// Current highest id known to the source
    async fn max_item_id(&self) -> std::result::Result<ItemId, SourceError>;

    /// Raw response body for one id
    ///
    /// Whatever the source answers is returned untouched, including `null`,
    /// empty and error-shaped bodies.
    async fn fetch_item(&self, id: ItemId) -> std::result::Result<String, SourceError>;
}

/// Production [`ItemSource`] backed by a shared reqwest client
#[derive(Clone, Debug)]
pub struct HttpItemSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpItemSource {
    /// Build a client from the source configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        // Url::join drops the last segment unless the base ends in a slash
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            Error::config("source.base_url", format!("invalid URL {:?}: {}", base, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL the endpoints are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, SourceError> {
        self.base_url
            .join(path)
            .map_err(|e| SourceError::Other(format!("cannot build URL for {}: {}", path, e)))
    }

    async fn get_text(
        &self,
        url: Url,
        is_failure: fn(StatusCode) -> bool,
    ) -> std::result::Result<String, SourceError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if is_failure(status) {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| SourceError::Body {
            url: url.to_string(),
            source,
        })
    }
}

/// Statuses worth retrying an item fetch for; every other body is a payload
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait::async_trait]
impl ItemSource for HttpItemSource {
    async fn max_item_id(&self) -> std::result::Result<ItemId, SourceError> {
        let url = self.endpoint("maxitem.json")?;
        let body = self.get_text(url, |status| !status.is_success()).await?;
        parse_max_item(&body)
    }

    async fn fetch_item(&self, id: ItemId) -> std::result::Result<String, SourceError> {
        let url = self.endpoint(&format!("item/{}.json", id))?;
        self.get_text(url, is_transient_status).await
    }
}

/// Parse the decimal body of the max item endpoint
fn parse_max_item(body: &str) -> std::result::Result<ItemId, SourceError> {
    body.trim()
        .parse::<ItemId>()
        .map_err(|_| SourceError::InvalidMaxItem {
            body: body.to_string(),
        })
}

/// Resolve the closed interval `[start, max_item_id]` for one run
///
/// The upper bound is queried once, without retry; failure aborts the run.
/// A `start` above the upper bound yields an empty range.
pub async fn resolve_range(source: &dyn ItemSource, start: ItemId) -> Result<IdRange> {
    let max = source.max_item_id().await?;
    let range = IdRange::new(start, max);
    tracing::info!(
        start = %range.start,
        max_item = %range.end,
        items = range.len(),
        "Resolved id range"
    );
    Ok(range)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpItemSource {
        let config = SourceConfig {
            base_url: format!("{}/v0", server.uri()),
            request_timeout: Duration::from_secs(5),
            ..SourceConfig::default()
        };
        HttpItemSource::new(&config).unwrap()
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let config = SourceConfig {
            base_url: "http://localhost:1/v0".to_string(),
            ..SourceConfig::default()
        };
        let source = HttpItemSource::new(&config).unwrap();
        assert_eq!(
            source.endpoint("maxitem.json").unwrap().as_str(),
            "http://localhost:1/v0/maxitem.json"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let config = SourceConfig {
            base_url: "::nope::".to_string(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            HttpItemSource::new(&config),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn parse_max_item_accepts_whitespace() {
        assert_eq!(parse_max_item("41234567\n").unwrap(), ItemId(41234567));
        assert!(matches!(
            parse_max_item("{\"error\":1}"),
            Err(SourceError::InvalidMaxItem { .. })
        ));
    }

    #[tokio::test]
    async fn max_item_id_reads_integer_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/maxitem.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("12"))
            .mount(&server)
            .await;

        assert_eq!(source_for(&server).max_item_id().await.unwrap(), ItemId(12));
    }

    #[tokio::test]
    async fn fetch_item_returns_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/item/10.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let body = source_for(&server).fetch_item(ItemId(10)).await.unwrap();
        assert_eq!(body, "null");
    }

    #[tokio::test]
    async fn client_error_bodies_are_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/item/3.json"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("{\"error\":\"Permission denied\"}"),
            )
            .mount(&server)
            .await;

        let body = source_for(&server).fetch_item(ItemId(3)).await.unwrap();
        assert_eq!(body, "{\"error\":\"Permission denied\"}");
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/item/1.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/item/2.json"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = source_for(&server);
        for (id, expected) in [(1, 503), (2, 429)] {
            match source.fetch_item(ItemId(id)).await {
                Err(SourceError::Status { status, .. }) => assert_eq!(status, expected),
                other => panic!("expected status error for {id}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn resolve_range_rejects_non_integer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/maxitem.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("soon"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let result = resolve_range(&source, ItemId(1)).await;
        assert!(matches!(
            result,
            Err(Error::Source(SourceError::InvalidMaxItem { .. }))
        ));
    }

    #[tokio::test]
    async fn resolve_range_allows_start_past_max() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/maxitem.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("5"))
            .mount(&server)
            .await;

        let range = resolve_range(&source_for(&server), ItemId(9)).await.unwrap();
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
    }

    #[tokio::test]
    async fn unreachable_source_is_request_error() {
        let config = SourceConfig {
            base_url: "http://127.0.0.1:9/v0/".to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            ..SourceConfig::default()
        };
        let source = HttpItemSource::new(&config).unwrap();
        assert!(matches!(
            source.max_item_id().await,
            Err(SourceError::Request { .. })
        ));
    }
}
