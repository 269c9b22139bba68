//! Run entry point: maps a [`RunConfig`] onto the pipeline

use crate::config::{Config, Mode, RunConfig};
use crate::crawler::Crawler;
use crate::db::Database;
use crate::error::Result;
use crate::export::export_items;
use crate::sink::open_sink;
use crate::source::{HttpItemSource, ItemSource, resolve_range};
use crate::types::RunOutcome;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execute one run against the HTTP source named in `config`
///
/// # Errors
///
/// Any fatal condition: invalid configuration, failing to resolve the upper
/// bound of the range, failing to open the sink, cancellation, or a crawl that
/// ended short of its expected count.
pub async fn run(
    config: &Config,
    run_config: RunConfig,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    config.validate()?;
    let source = Arc::new(HttpItemSource::new(&config.source)?);
    run_with_source(config, run_config, source, cancel).await
}

/// Execute one run against an arbitrary [`ItemSource`]
///
/// # Errors
///
/// Same as [`run`]; `config` is validated here as well.
pub async fn run_with_source(
    config: &Config,
    run_config: RunConfig,
    source: Arc<dyn ItemSource>,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    config.validate()?;
    tracing::debug!(?run_config, "Starting run");

    match run_config.mode {
        Mode::Crawl | Mode::Resume => {
            let start = run_config.start_id()?;
            let range = resolve_range(source.as_ref(), start).await?;

            let mut sink = open_sink(run_config.sink_kind(), &config.output).await?;
            let crawler = Crawler::new(source, config.crawl.clone(), config.retry.clone());
            let report = crawler.run(range, sink.as_mut(), cancel).await?;

            Ok(RunOutcome::Crawled(report))
        }
        Mode::Export => {
            let db = Database::new(&config.output.database_path).await?;
            let result = export_items(
                &db,
                &config.output.export_path,
                config.output.write_buffer,
                cancel,
            )
            .await;
            db.close().await;

            Ok(RunOutcome::Exported(result?))
        }
    }
}
