//! Bounded-concurrency fetch-and-persist pipeline
//!
//! ```text
//! feeder ──► id queue (bounded, Q) ──► N workers ──► result channel ──► sink
//!                  ▲                                                    │
//!                  └──────────── completion monitor closes ◄────────────┘
//! ```
//!
//! One feeder task enqueues every id of the range in ascending order. Workers
//! fetch ids with retry and forward each outcome. The caller's task consumes
//! outcomes, writes fetched records to the sink, and counts them. Once as many
//! outcomes arrived as the range holds ids, the id queue is closed and every
//! task is joined before the sink is flushed.

mod feeder;
mod monitor;
mod worker;

use crate::config::{CrawlConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::sink::RecordSink;
use crate::source::ItemSource;
use crate::types::{CrawlReport, IdRange, WorkerMessage, WriteFailure};
use monitor::CompletionMonitor;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use worker::WorkerContext;

/// Runs crawls against one item source
#[derive(Clone)]
pub struct Crawler {
    source: Arc<dyn ItemSource>,
    crawl: CrawlConfig,
    retry: RetryConfig,
}

impl Crawler {
    /// Create a crawler with the given pool sizing and retry policy
    pub fn new(source: Arc<dyn ItemSource>, crawl: CrawlConfig, retry: RetryConfig) -> Self {
        Self {
            source,
            crawl,
            retry,
        }
    }

    /// Crawl every id in `range` into `sink`
    ///
    /// Returns once every id has produced an outcome (a persisted record, a
    /// write failure, or a dead letter), all tasks have exited, and the sink
    /// has been flushed. Results arrive in completion order, not id order.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fired before every id was accounted for
    ///   (the sink is still flushed first)
    /// - [`Error::Incomplete`] if the workers stopped short of the expected count
    /// - any error returned by [`RecordSink::flush`]
    pub async fn run(
        &self,
        range: IdRange,
        sink: &mut dyn RecordSink,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport> {
        let started = Instant::now();
        let expected = range.len();

        let mut report = CrawlReport {
            range,
            expected,
            persisted: 0,
            write_failures: Vec::new(),
            dead_letters: Vec::new(),
            elapsed: Default::default(),
        };

        if range.is_empty() {
            tracing::info!(range = %range, "Empty id range, nothing to crawl");
            let deferred = sink.flush().await?;
            absorb_deferred(&mut report, deferred);
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let worker_count = self.crawl.workers.min(expected as usize).max(1);
        // Both channels panic on a zero capacity
        let queue_capacity = self.crawl.queue_capacity.max(1);
        let result_buffer = self.crawl.result_buffer.max(1);
        tracing::info!(
            range = %range,
            items = expected,
            workers = worker_count,
            queue_capacity,
            sink = ?sink.kind(),
            "Starting crawl"
        );

        let (id_tx, id_rx) = async_channel::bounded(queue_capacity);
        let (result_tx, mut result_rx) = mpsc::channel(result_buffer);
        let mut monitor = CompletionMonitor::new(expected, id_rx.clone());

        let feeder = feeder::spawn_feeder(range, id_tx, cancel.clone());
        let ctx = Arc::new(WorkerContext {
            source: self.source.clone(),
            retry: self.retry.clone(),
            range,
            progress_interval: self.crawl.progress_interval.max(1),
            cancel: cancel.clone(),
        });
        let workers = worker::spawn_workers(worker_count, ctx, id_rx, result_tx);

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(
                        received = monitor.received(),
                        expected,
                        "Crawl cancelled"
                    );
                    break;
                }
                message = result_rx.recv() => match message {
                    Some(message) => message,
                    // Every worker has exited
                    None => break,
                },
            };

            match message {
                WorkerMessage::Fetched(record) => match sink.persist(&record).await {
                    Ok(deferred) => {
                        report.persisted += 1;
                        absorb_deferred(&mut report, deferred);
                    }
                    Err(e) => {
                        tracing::warn!(item_id = %record.id, error = %e, "Failed to persist item");
                        report.write_failures.push(WriteFailure {
                            id: record.id,
                            error: e.to_string(),
                        });
                    }
                },
                WorkerMessage::Abandoned(dead) => report.dead_letters.push(dead),
            }

            if monitor.record() {
                break;
            }
        }

        // Release the feeder and any idle worker, then wait for all of them
        monitor.close_queue();
        drop(result_rx);

        for (index, result) in futures::future::join_all(workers).await.into_iter().enumerate() {
            if let Err(e) = result {
                tracing::error!(worker = index, error = %e, "Fetch worker task failed");
            }
        }
        match feeder.await {
            Ok(sent) => tracing::debug!(sent, "Feeder joined"),
            Err(e) => tracing::error!(error = %e, "Feeder task failed"),
        }

        let deferred = sink.flush().await?;
        absorb_deferred(&mut report, deferred);
        report.elapsed = started.elapsed();

        if !monitor.is_complete() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    persisted: report.persisted,
                    expected,
                });
            }
            return Err(Error::Incomplete {
                received: monitor.received(),
                expected: monitor.expected(),
            });
        }

        if report.write_failures.is_empty() && report.dead_letters.is_empty() {
            tracing::info!(
                persisted = report.persisted,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Crawl complete"
            );
        } else {
            tracing::warn!(
                persisted = report.persisted,
                write_failures = report.write_failures.len(),
                dead_letters = report.dead_letters.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Crawl finished with unpersisted items"
            );
        }

        Ok(report)
    }
}

/// Move records the sink accepted earlier but failed to store into the failures
fn absorb_deferred(report: &mut CrawlReport, deferred: Vec<WriteFailure>) {
    for failure in deferred {
        tracing::warn!(item_id = %failure.id, error = %failure.error, "Failed to persist item");
        report.persisted = report.persisted.saturating_sub(1);
        report.write_failures.push(failure);
    }
}
