use anyhow::Result;
use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{from_timestamp, Feed, FeedMetadata, FeedRow};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Subscribe to a feed, returning its id.
    ///
    /// Adding a URL that is already subscribed updates the title (when one
    /// is given) and returns the existing id.
    pub async fn add_feed(
        &self,
        url: &str,
        title: Option<&str>,
        web_page_link: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now().timestamp();
        let row: (i64,) = sqlx::query_as(
            r#"
                INSERT INTO feeds (url, title, web_page_link, date_added)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(url) DO UPDATE SET
                    title = CASE WHEN ? IS NULL THEN feeds.title ELSE excluded.title END,
                    web_page_link = COALESCE(excluded.web_page_link, feeds.web_page_link)
                RETURNING id
            "#,
        )
        .bind(url)
        .bind(title.unwrap_or(url))
        .bind(web_page_link)
        .bind(now)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// All feeds ordered by title, with total and unread item counts.
    pub async fn feeds(&self) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
                SELECT
                    f.id, f.url, f.title, f.web_page_link, f.date_added,
                    f.last_updated, f.last_purged,
                    COUNT(i.id) AS item_count,
                    COUNT(CASE WHEN i.read = 0 THEN 1 END) AS unread_count
                FROM feeds f
                LEFT JOIN items i ON f.id = i.feed_id
                GROUP BY f.id
                ORDER BY f.title COLLATE NOCASE, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let feeds = rows
            .into_iter()
            .map(
                |(
                    id,
                    url,
                    title,
                    web_page_link,
                    date_added,
                    last_updated,
                    last_purged,
                    item_count,
                    unread_count,
                )| Feed {
                    id,
                    url,
                    title,
                    web_page_link,
                    date_added: from_timestamp(date_added).unwrap_or_default(),
                    last_updated: last_updated.and_then(from_timestamp),
                    last_purged: last_purged.and_then(from_timestamp),
                    item_count,
                    unread_count,
                },
            )
            .collect();

        Ok(feeds)
    }

    pub async fn feed(&self, feed_id: i64) -> Result<Option<Feed>> {
        Ok(self.feeds().await?.into_iter().find(|f| f.id == feed_id))
    }

    /// Ids of every subscribed feed, in the order `sync` processes them.
    pub async fn feed_ids(&self) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub(crate) async fn load_feed_metadata(&self, feed_id: i64) -> Result<Option<FeedMetadata>> {
        let row: Option<(String, Option<String>, Option<i64>, Option<i64>)> = sqlx::query_as(
            "SELECT url, web_page_link, last_updated, last_purged FROM feeds WHERE id = ?",
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(
            row.map(|(url, web_page_link, last_updated, last_purged)| FeedMetadata {
                url,
                web_page_link,
                last_updated: last_updated.and_then(from_timestamp),
                last_purged: last_purged.and_then(from_timestamp),
            }),
        )
    }

    /// Returns false when no such feed exists.
    pub async fn update_last_updated(&self, feed_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE feeds SET last_updated = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the cutoff of the latest purge so older items are not re-added.
    pub async fn set_last_purged(&self, feed_id: i64, cutoff: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE feeds SET last_purged = ? WHERE id = ?")
            .bind(cutoff.timestamp())
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Unsubscribe; the feed's items go with it.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;
    use chrono::{TimeZone, Utc};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_add_and_list_feeds() {
        let db = test_db().await;
        let b = db
            .add_feed("https://b.example.com/rss", Some("Beta"), None)
            .await
            .unwrap();
        let a = db
            .add_feed(
                "https://a.example.com/rss",
                Some("alpha"),
                Some("https://a.example.com/"),
            )
            .await
            .unwrap();

        let feeds = db.feeds().await.unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].id, a);
        assert_eq!(feeds[0].base_link(), "https://a.example.com/");
        assert_eq!(feeds[1].id, b);
        assert_eq!(feeds[1].base_link(), "https://b.example.com/rss");
        assert_eq!(feeds[1].item_count, 0);
        assert!(feeds[1].last_updated.is_none());

        assert_eq!(db.feed_ids().await.unwrap(), vec![b, a]);
    }

    #[tokio::test]
    async fn test_add_existing_url_returns_same_id() {
        let db = test_db().await;
        let first = db
            .add_feed("https://x.example.com/rss", Some("X"), None)
            .await
            .unwrap();
        let second = db
            .add_feed("https://x.example.com/rss", None, None)
            .await
            .unwrap();
        assert_eq!(first, second);

        let feed = db.feed(first).await.unwrap().unwrap();
        assert_eq!(feed.title, "X");
    }

    #[tokio::test]
    async fn test_untitled_feed_uses_url() {
        let db = test_db().await;
        let id = db
            .add_feed("https://untitled.example.com/rss", None, None)
            .await
            .unwrap();
        let feed = db.feed(id).await.unwrap().unwrap();
        assert_eq!(feed.title, "https://untitled.example.com/rss");
    }

    #[tokio::test]
    async fn test_thresholds_round_trip() {
        let db = test_db().await;
        let id = db
            .add_feed("https://x.example.com/rss", None, None)
            .await
            .unwrap();
        let updated = Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap();
        let purged = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(db.update_last_updated(id, updated).await.unwrap());
        db.set_last_purged(id, purged).await.unwrap();

        let meta = db.load_feed_metadata(id).await.unwrap().unwrap();
        assert_eq!(meta.url, "https://x.example.com/rss");
        assert_eq!(meta.last_updated, Some(updated));
        assert_eq!(meta.last_purged, Some(purged));

        assert!(!db.update_last_updated(999, updated).await.unwrap());
        assert!(db.load_feed_metadata(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_feed() {
        let db = test_db().await;
        let id = db
            .add_feed("https://x.example.com/rss", None, None)
            .await
            .unwrap();
        assert!(db.delete_feed(id).await.unwrap());
        assert!(!db.delete_feed(id).await.unwrap());
        assert!(db.feeds().await.unwrap().is_empty());
    }
}
