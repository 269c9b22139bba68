//! Completion monitor: counts outcomes against the size of the range.

use crate::types::ItemId;
use async_channel::Receiver;

/// Counting rendezvous between the result consumer and the id queue
///
/// Each outcome taken off the result channel is recorded once. When the count
/// reaches the number of ids in the range, the id queue is closed so workers
/// still waiting on it exit. An expected count of zero is complete from the
/// start.
#[derive(Debug)]
pub(crate) struct CompletionMonitor {
    expected: u64,
    received: u64,
    queue: Receiver<ItemId>,
}

impl CompletionMonitor {
    pub(crate) fn new(expected: u64, queue: Receiver<ItemId>) -> Self {
        let monitor = Self {
            expected,
            received: 0,
            queue,
        };
        if monitor.is_complete() {
            monitor.close_queue();
        }
        monitor
    }

    /// Count one outcome; returns true once every id is accounted for
    pub(crate) fn record(&mut self) -> bool {
        self.received += 1;
        if self.received > self.expected {
            tracing::warn!(
                received = self.received,
                expected = self.expected,
                "More results than ids in range"
            );
        }
        if self.is_complete() {
            tracing::debug!(received = self.received, "All results received, closing id queue");
            self.close_queue();
            return true;
        }
        false
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.received >= self.expected
    }

    pub(crate) fn received(&self) -> u64 {
        self.received
    }

    pub(crate) fn expected(&self) -> u64 {
        self.expected
    }

    /// Close the id queue; idempotent
    pub(crate) fn close_queue(&self) {
        self.queue.close();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closes_queue_at_expected_count() {
        let (tx, rx) = async_channel::bounded::<ItemId>(4);
        let mut monitor = CompletionMonitor::new(3, rx.clone());

        assert!(!monitor.record());
        assert!(!monitor.record());
        assert!(!tx.is_closed());
        assert!(monitor.record());

        assert!(monitor.is_complete());
        assert_eq!(monitor.received(), 3);
        assert!(tx.is_closed());
        assert!(rx.recv().await.is_err(), "waiting workers are released");
    }

    #[test]
    fn zero_expected_is_complete_immediately() {
        let (tx, rx) = async_channel::bounded::<ItemId>(1);
        let monitor = CompletionMonitor::new(0, rx);

        assert!(monitor.is_complete());
        assert_eq!(monitor.expected(), 0);
        assert!(tx.is_closed());
    }

    #[test]
    fn single_id_range() {
        let (_tx, rx) = async_channel::bounded::<ItemId>(1);
        let mut monitor = CompletionMonitor::new(1, rx);

        assert!(!monitor.is_complete());
        assert!(monitor.record());
    }
}
