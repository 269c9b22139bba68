//! Item table operations.

use futures::{Stream, TryStreamExt};

use crate::error::DatabaseError;
use crate::types::{ItemId, Record};
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Insert a record unless its id is already stored
    ///
    /// The first payload written for an id is kept; later writes for the same
    /// id are ignored.
    pub async fn insert_item(&self, record: &Record) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, value)
            VALUES (?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert item {}: {}",
                record.id, e
            )))
        })?;

        Ok(())
    }

    /// Insert many records in one transaction, ignoring ids already stored
    ///
    /// Either every record is written or none is.
    pub async fn insert_items_batch(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999, two per record
        const MAX_ITEMS_PER_STATEMENT: usize = 499;

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin items transaction: {}",
                e
            )))
        })?;

        for chunk in records.chunks(MAX_ITEMS_PER_STATEMENT) {
            let mut query_builder = sqlx::QueryBuilder::new("INSERT INTO items (id, value) ");

            query_builder.push_values(chunk, |mut b, record| {
                b.push_bind(record.id).push_bind(&record.payload);
            });
            query_builder.push(" ON CONFLICT(id) DO NOTHING");

            query_builder.build().execute(&mut *tx).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert items batch: {}",
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit items batch: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get the stored payload for an id
    ///
    /// Returns None if the id has not been stored.
    pub async fn get_item(&self, id: ItemId) -> Result<Option<String>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM items WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to get item {}: {}",
                        id, e
                    )))
                })?;

        // A row with a NULL value reads back as an empty payload
        Ok(value.map(Option::unwrap_or_default))
    }

    /// Number of rows in the items table
    pub async fn count_items(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count items: {}",
                    e
                )))
            })?;

        Ok(count as u64)
    }

    /// Stream every stored payload in ascending id order
    pub fn stream_values(&self) -> impl Stream<Item = Result<String>> + '_ {
        sqlx::query_scalar::<_, Option<String>>("SELECT value FROM items ORDER BY id")
            .fetch(&self.pool)
            .map_ok(Option::unwrap_or_default)
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read items: {}",
                    e
                )))
            })
    }
}
