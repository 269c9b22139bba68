//! Table to line file export

use crate::db::Database;
use crate::error::Result;
use crate::types::ExportReport;
use futures::TryStreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

/// Write every stored payload to `path`, one per line, in ascending id order
///
/// The file is created (or truncated) first and flushed once at the end. An
/// unchanged table always exports to a byte-identical file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written, if reading the
/// table fails, or [`crate::Error::Cancelled`] if `cancel` fires mid-export.
pub async fn export_items(
    db: &Database,
    path: &Path,
    write_buffer: usize,
    cancel: &CancellationToken,
) -> Result<ExportReport> {
    let file = File::create(path).await?;
    let mut writer = BufWriter::with_capacity(write_buffer, file);
    let mut lines: u64 = 0;

    tracing::info!(path = %path.display(), "Exporting items");

    let mut values = std::pin::pin!(db.stream_values());
    while let Some(value) = values.try_next().await? {
        if cancel.is_cancelled() {
            writer.flush().await?;
            return Err(crate::Error::Cancelled {
                persisted: lines,
                expected: db.count_items().await?,
            });
        }
        writer.write_all(value.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        lines += 1;
    }

    writer.flush().await?;
    writer.get_mut().sync_all().await?;

    tracing::info!(lines, path = %path.display(), "Export complete");

    Ok(ExportReport {
        lines,
        path: path.to_path_buf(),
    })
}
