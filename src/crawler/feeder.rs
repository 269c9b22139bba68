//! Id feeder: pushes every id of the range into the bounded queue.

use crate::types::{IdRange, ItemId};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the single producer of the id queue
///
/// Ids are sent in ascending order. A full queue suspends the feeder, so id
/// generation never runs further ahead of the workers than the queue capacity.
/// The task ends when the range is exhausted, the queue is closed, or `cancel`
/// fires; dropping `tx` on exit lets idle workers observe the end of input.
///
/// Returns the number of ids that were enqueued.
pub(crate) fn spawn_feeder(
    range: IdRange,
    tx: Sender<ItemId>,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut sent: u64 = 0;

        for id in range.iter() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(sent, "Feeder cancelled");
                    break;
                }
                result = tx.send(id) => {
                    if result.is_err() {
                        tracing::debug!(item_id = %id, sent, "Id queue closed, feeder stopping");
                        break;
                    }
                    sent += 1;
                }
            }
        }

        tracing::debug!(sent, "Feeder finished");
        sent
    })
}
