//! # hn-crawl
//!
//! Bounded-concurrency crawler that copies every item of a Hacker News style
//! API into SQLite or a line-delimited file.
//!
//! A run resolves the current maximum id once, feeds the id range through a
//! bounded queue to a fixed pool of fetch workers, and persists each raw
//! response body exactly once through a single sink.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hn_crawl::{Config, RunConfig, RunOutcome};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.crawl.workers = 64;
//!
//!     let cancel = CancellationToken::new();
//!     hn_crawl::cancel_on_signal(cancel.clone());
//!
//!     if let RunOutcome::Crawled(report) =
//!         hn_crawl::run(&config, RunConfig::crawl(), &cancel).await?
//!     {
//!         println!("stored {} of {} items", report.persisted, report.expected);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Fetch-and-persist pipeline
pub mod crawler;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Table to file export
pub mod export;
/// Retry logic with exponential backoff
pub mod retry;
/// Run entry point
pub mod runner;
/// Result sinks
pub mod sink;
/// Remote item source
pub mod source;
/// Core types
pub mod types;

pub use config::{
    Config, CrawlConfig, Mode, OutputConfig, RetryConfig, RunConfig, SinkKind, SourceConfig,
};
pub use crawler::Crawler;
pub use db::Database;
pub use error::{DatabaseError, Error, Result, SourceError};
pub use export::export_items;
pub use runner::{run, run_with_source};
pub use sink::{FileSink, RecordSink, TableSink, open_sink};
pub use source::{HttpItemSource, ItemSource, resolve_range};
pub use types::{
    CrawlReport, DeadLetter, ExportReport, IdRange, ItemId, Record, RunOutcome, WorkerMessage,
    WriteFailure,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives SIGINT or SIGTERM (Ctrl+C elsewhere)
///
/// The listener runs on a background task; it also ends quietly if the token
/// is cancelled by other means first.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Shutdown requested, cancelling crawl");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register unix signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
