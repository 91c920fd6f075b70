use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use std::collections::HashSet;

use super::schema::Database;
use super::store::FeedStore;
use super::types::{FeedMetadata, ItemDbRow, StoreError, StoredItem, CATEGORY_SEPARATOR};
use crate::feed::ParsedItem;

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Insert items, skipping any whose guid is already stored for the feed.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn insert_items(&self, feed_id: i64, items: &[ParsedItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        // 15 binds per row keeps each chunk well under SQLite's variable limit
        const BATCH_SIZE: usize = 50;
        let mut total_inserted: usize = 0;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO items (feed_id, guid, title, author, link, description, \
                 content, categories, published, thumbnail, enclosure_url, enclosure_length, \
                 enclosure_type) ",
            );

            builder.push_values(chunk, |mut b, item| {
                let categories = item
                    .categories
                    .iter()
                    .map(|c| c.replace(CATEGORY_SEPARATOR, " "))
                    .collect::<Vec<_>>()
                    .join(&CATEGORY_SEPARATOR.to_string());
                let enclosure = item.enclosure.as_ref();

                b.push_bind(feed_id)
                    .push_bind(&item.guid)
                    .push_bind(&item.title)
                    .push_bind(&item.author)
                    .push_bind(&item.link)
                    .push_bind(&item.description)
                    .push_bind(&item.content)
                    .push_bind(categories)
                    .push_bind(item.published.timestamp())
                    .push_bind(&item.thumbnail)
                    .push_bind(enclosure.map(|e| e.url.clone()))
                    .push_bind(enclosure.map(|e| i64::try_from(e.length).unwrap_or(i64::MAX)))
                    .push_bind(enclosure.map(|e| e.mime_type.clone()));
            });

            let result = builder.build().execute(&mut *tx).await?;
            total_inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Items of a feed, newest first. This is the row order used for display
    /// and therefore for prefetch windows.
    pub async fn items_for_feed(&self, feed_id: i64) -> Result<Vec<StoredItem>> {
        let rows: Vec<ItemDbRow> = sqlx::query_as(
            r#"
                SELECT id, feed_id, guid, title, author, link, description, content,
                       categories, published, thumbnail, enclosure_url, enclosure_length,
                       enclosure_type, read
                FROM items
                WHERE feed_id = ?
                ORDER BY published DESC, id DESC
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemDbRow::into_stored).collect())
    }

    pub async fn guids_for_feed(&self, feed_id: i64) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT guid FROM items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(guid,)| guid).collect())
    }

    pub async fn mark_item_read(&self, item_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE items SET read = 1 WHERE id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a feed's items published before `cutoff`.
    ///
    /// Unread items are kept unless `include_unread` is set.
    pub async fn delete_items_before(
        &self,
        feed_id: i64,
        cutoff: DateTime<Utc>,
        include_unread: bool,
    ) -> Result<u64> {
        let sql = if include_unread {
            "DELETE FROM items WHERE feed_id = ? AND published < ?"
        } else {
            "DELETE FROM items WHERE feed_id = ? AND published < ? AND read = 1"
        };
        let result = sqlx::query(sql)
            .bind(feed_id)
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FeedStore for Database {
    async fn feed_metadata(&self, feed_id: i64) -> Result<FeedMetadata, StoreError> {
        self.load_feed_metadata(feed_id)
            .await?
            .ok_or(StoreError::NotFound(feed_id))
    }

    async fn existing_guids(&self, feed_id: i64) -> Result<HashSet<String>, StoreError> {
        Ok(self.guids_for_feed(feed_id).await?)
    }

    async fn set_last_updated(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        if self.update_last_updated(feed_id, at).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(feed_id))
        }
    }

    async fn store_items(&self, feed_id: i64, items: &[ParsedItem]) -> Result<usize, StoreError> {
        Ok(self.insert_items(feed_id, items).await?)
    }
}
