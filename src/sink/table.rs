//! Keyed table sink

use super::RecordSink;
use crate::config::SinkKind;
use crate::db::Database;
use crate::error::Result;
use crate::types::{Record, WriteFailure};
use std::sync::Arc;

/// Default number of records committed per transaction
pub const TABLE_BATCH_SIZE: usize = 500;

/// Inserts records into the `items` table, one transaction per batch
///
/// The first payload stored for an id is kept; re-crawling an id never
/// duplicates or replaces it. Accepted records are held in memory until the
/// batch fills or [`RecordSink::flush`] is called. If a batch transaction
/// fails, its rows are retried one at a time and only the rows that still
/// fail are reported.
pub struct TableSink {
    db: Arc<Database>,
    pending: Vec<Record>,
    batch_size: usize,
}

impl TableSink {
    /// Wrap an open database with the default batch size
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_batch_size(db, TABLE_BATCH_SIZE)
    }

    /// Wrap an open database, committing every `batch_size` records
    pub fn with_batch_size(db: Arc<Database>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            db,
            pending: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Database the sink writes to
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Records accepted but not yet committed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn commit_pending(&mut self) -> Vec<WriteFailure> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let Err(e) = self.db.insert_items_batch(&batch).await else {
            tracing::trace!(batch_size = batch.len(), "Committed items batch");
            return Vec::new();
        };

        tracing::warn!(
            batch_size = batch.len(),
            error = %e,
            "Items batch failed, retrying rows individually"
        );

        let mut failures = Vec::new();
        for record in &batch {
            if let Err(e) = self.db.insert_item(record).await {
                failures.push(WriteFailure {
                    id: record.id,
                    error: e.to_string(),
                });
            }
        }
        failures
    }
}

#[async_trait::async_trait]
impl RecordSink for TableSink {
    async fn persist(&mut self, record: &Record) -> Result<Vec<WriteFailure>> {
        self.pending.push(record.clone());
        if self.pending.len() >= self.batch_size {
            return Ok(self.commit_pending().await);
        }
        Ok(Vec::new())
    }

    async fn flush(&mut self) -> Result<Vec<WriteFailure>> {
        Ok(self.commit_pending().await)
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Table
    }
}
