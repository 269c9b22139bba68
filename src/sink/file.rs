//! Append-only line file sink

use super::RecordSink;
use crate::config::SinkKind;
use crate::error::Result;
use crate::types::{Record, WriteFailure};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes each payload followed by `\n`, in the order records arrive
///
/// Output is buffered and only guaranteed on disk after [`RecordSink::flush`].
pub struct FileSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileSink {
    /// Create (or truncate) `path` with a write buffer of `capacity` bytes
    pub async fn create(path: &Path, capacity: usize) -> Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            writer: BufWriter::with_capacity(capacity, file),
            path: path.to_path_buf(),
        })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RecordSink for FileSink {
    async fn persist(&mut self, record: &Record) -> Result<Vec<WriteFailure>> {
        self.writer.write_all(record.payload.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(Vec::new())
    }

    // Flush errors abort the run; buffered lines are not attributable to ids
    async fn flush(&mut self) -> Result<Vec<WriteFailure>> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        Ok(Vec::new())
    }

    fn kind(&self) -> SinkKind {
        SinkKind::File
    }
}
