//! Database layer for hn-crawl
//!
//! Handles SQLite persistence of crawled items.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`items`]: The keyed `items` table (`id` → raw payload)

use sqlx::sqlite::SqlitePool;

mod items;
mod migrations;

/// Database handle for hn-crawl
pub struct Database {
    pool: SqlitePool,
}
