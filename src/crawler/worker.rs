//! Fetch worker pool.

use crate::config::RetryConfig;
use crate::retry::{RetryError, fetch_with_retry};
use crate::source::ItemSource;
use crate::types::{DeadLetter, IdRange, ItemId, Record, WorkerMessage};
use async_channel::Receiver;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State shared read-only by every worker
pub(crate) struct WorkerContext {
    pub source: Arc<dyn ItemSource>,
    pub retry: RetryConfig,
    pub range: IdRange,
    pub progress_interval: u64,
    pub cancel: CancellationToken,
}

/// Spawn `count` workers draining `ids` into `results`
///
/// Each worker owns clones of the queue receiver and the result sender, so the
/// result channel closes once every worker has exited.
pub(crate) fn spawn_workers(
    count: usize,
    ctx: Arc<WorkerContext>,
    ids: Receiver<ItemId>,
    results: mpsc::Sender<WorkerMessage>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker| {
            tokio::spawn(run_worker(
                worker,
                ctx.clone(),
                ids.clone(),
                results.clone(),
            ))
        })
        .collect()
}

async fn run_worker(
    worker: usize,
    ctx: Arc<WorkerContext>,
    ids: Receiver<ItemId>,
    results: mpsc::Sender<WorkerMessage>,
) {
    loop {
        let id = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            next = ids.recv() => match next {
                Ok(id) => id,
                // Closed and drained
                Err(_) => break,
            },
        };

        if id.get() % ctx.progress_interval as i64 == 0 {
            tracing::info!(
                item_id = %id,
                percent = format_args!("{:.2}", ctx.range.progress_percent(id)),
                "Crawl progress"
            );
        }

        let Some(message) = fetch_one(&ctx, id).await else {
            break;
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            sent = results.send(message) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    tracing::trace!(worker, "Fetch worker exiting");
}

/// Fetch one id with retry; `None` means the run was cancelled
async fn fetch_one(ctx: &WorkerContext, id: ItemId) -> Option<WorkerMessage> {
    let source = ctx.source.as_ref();
    match fetch_with_retry(&ctx.retry, &ctx.cancel, move || source.fetch_item(id)).await {
        Ok(payload) => Some(WorkerMessage::Fetched(Record { id, payload })),
        Err(RetryError::Exhausted { attempts, last }) => {
            tracing::warn!(item_id = %id, attempts, error = %last, "Giving up on item");
            Some(WorkerMessage::Abandoned(DeadLetter {
                id,
                attempts,
                error: last.to_string(),
            }))
        }
        Err(RetryError::Permanent { attempts, error }) => {
            tracing::warn!(item_id = %id, attempts, error = %error, "Item fetch failed permanently");
            Some(WorkerMessage::Abandoned(DeadLetter {
                id,
                attempts,
                error: error.to_string(),
            }))
        }
        Err(RetryError::Cancelled { attempts }) => {
            tracing::debug!(item_id = %id, attempts, "Fetch cancelled");
            None
        }
    }
}
