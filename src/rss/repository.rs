//! Repository for the `rss_items` table.
//!
//! Writes are a full refresh: every existing row is deleted, then the new
//! items are inserted one by one. The two steps are not wrapped in a
//! transaction, so a failed insert leaves the table holding only the rows
//! inserted before it.

use tracing::{debug, error, info};

use super::types::{FeedItem, StoredRssItem};
use crate::db::DbPool;
use crate::error::describe_error_chain;
use crate::{IngestError, Result};

/// Outcome of a full refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    /// Rows removed by the clear step.
    pub rows_cleared: u64,
    /// Rows inserted afterwards.
    pub inserted: usize,
}

/// Repository for stored feed items.
pub struct RssItemRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RssItemRepository<'a> {
    /// Create a new repository with the given database pool.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Delete every stored item, returning the number of rows removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rss_items")
            .execute(self.pool)
            .await
            .map_err(|e| write_error("clear", &e))?;
        Ok(result.rows_affected())
    }

    /// Insert one item and return its row ID.
    pub async fn insert(&self, item: &FeedItem) -> Result<i32> {
        let id: (i32,) = sqlx::query_as(
            r#"
            INSERT INTO rss_items (title, description, link, pub_date, author, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.link)
        .bind(item.pub_date)
        .bind(&item.author)
        .bind(&item.category)
        .fetch_one(self.pool)
        .await
        .map_err(|e| write_error(&format!("insert of item {:?}", item.title), &e))?;
        Ok(id.0)
    }

    /// Replace the table contents with `items`.
    ///
    /// Items are inserted in document order. The first failing insert aborts
    /// the refresh with [`IngestError::Write`] naming the item's position and
    /// title; rows already deleted or inserted stay as they are.
    pub async fn replace_all(&self, items: &[FeedItem]) -> Result<WriteReport> {
        let rows_cleared = self.clear().await?;
        debug!("Cleared {} existing row(s)", rows_cleared);

        for (index, item) in items.iter().enumerate() {
            if let Err(e) = self.insert(item).await {
                let cause = match e {
                    IngestError::Write(message) => message,
                    other => other.to_string(),
                };
                error!(
                    "Failed to insert item {} of {} ({:?}): {}",
                    index + 1,
                    items.len(),
                    item.title,
                    cause
                );
                return Err(IngestError::Write(format!(
                    "item {} of {}: {}",
                    index + 1,
                    items.len(),
                    cause
                )));
            }
        }

        info!("Stored {} item(s)", items.len());
        Ok(WriteReport {
            rows_cleared,
            inserted: items.len(),
        })
    }

    /// Count stored items.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rss_items")
            .fetch_one(self.pool)
            .await?;
        Ok(count.0)
    }

    /// List stored items in insertion order.
    pub async fn list_all(&self) -> Result<Vec<StoredRssItem>> {
        let items = sqlx::query_as::<_, StoredRssItem>(
            r#"
            SELECT id, title, description, link, pub_date, author, category
            FROM rss_items
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }
}

fn write_error(stage: &str, err: &sqlx::Error) -> IngestError {
    IngestError::Write(format!("{} failed: {}", stage, describe_write_error(err)))
}

/// Render a database error with its SQLSTATE, constraint and detail when known.
pub fn describe_write_error(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => {
            let mut message = db_err.message().to_string();
            if let Some(code) = db_err.code() {
                message.push_str(&format!(" (code {})", code));
            }
            if let Some(constraint) = db_err.constraint() {
                message.push_str(&format!(" [constraint {}]", constraint));
            }
            if let Some(detail) = database_detail(&**db_err) {
                message.push_str(&format!(": {}", detail));
            }
            message
        }
        other => describe_error_chain(other),
    }
}

#[cfg(feature = "postgres")]
fn database_detail(err: &dyn sqlx::error::DatabaseError) -> Option<String> {
    err.try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
        .and_then(|pg| pg.detail())
        .map(str::to_string)
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn database_detail(_err: &dyn sqlx::error::DatabaseError) -> Option<String> {
    None
}
