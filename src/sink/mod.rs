//! Result sinks
//!
//! A sink is the single consumer of fetched records. Two implementations share
//! the [`RecordSink`] contract:
//! - [`TableSink`] inserts into the keyed `items` table in batched transactions
//! - [`FileSink`] appends each payload as one line, in arrival order

use crate::config::{OutputConfig, SinkKind};
use crate::db::Database;
use crate::error::Result;
use crate::types::{Record, WriteFailure};
use std::sync::Arc;

mod file;
mod table;

pub use file::FileSink;
pub use table::TableSink;

/// Durable destination for fetched records
///
/// `persist` is called once per record; `flush` once after the last record,
/// including after a cancelled run.
///
/// Sinks may buffer. A write that fails after `persist` already accepted the
/// record is reported later, as a [`WriteFailure`] returned from a subsequent
/// `persist` or from `flush`.
#[async_trait::async_trait]
pub trait RecordSink: Send {
    /// Accept one record
    ///
    /// `Err` means this record was not stored. `Ok` carries earlier accepted
    /// records whose deferred write failed.
    async fn persist(&mut self, record: &Record) -> Result<Vec<WriteFailure>>;

    /// Make everything accepted so far durable
    ///
    /// Returns accepted records that could not be written.
    async fn flush(&mut self) -> Result<Vec<WriteFailure>>;

    /// Which kind of sink this is
    fn kind(&self) -> SinkKind;
}

/// Open the sink selected for a run
///
/// The table sink uses `output.database_path`; the file sink creates (or
/// truncates) `output.update_path`.
///
/// # Errors
///
/// Failing to open the database or create the file is fatal for the run.
pub async fn open_sink(kind: SinkKind, output: &OutputConfig) -> Result<Box<dyn RecordSink>> {
    match kind {
        SinkKind::Table => {
            let db = Database::new(&output.database_path).await?;
            tracing::info!(path = %output.database_path.display(), "Opened table sink");
            Ok(Box::new(TableSink::with_batch_size(
                Arc::new(db),
                output.table_batch_size,
            )))
        }
        SinkKind::File => {
            let sink = FileSink::create(&output.update_path, output.write_buffer).await?;
            tracing::info!(path = %output.update_path.display(), "Opened file sink");
            Ok(Box::new(sink))
        }
    }
}
