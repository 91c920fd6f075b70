use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::storage::Database;

/// Outcome of purging one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPurged {
    pub feed_id: i64,
    pub deleted: u64,
    pub cutoff: DateTime<Utc>,
}

/// Deletes old items and records the purge cutoff on the feed.
///
/// The recorded cutoff becomes the feed's `last_purged` threshold, so the
/// next sync will not re-insert the purged items even though the feed
/// document still lists them.
#[derive(Clone)]
pub struct FeedPurger {
    db: Database,
}

impl FeedPurger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Purge every feed of items older than `days`.
    pub async fn purge_all(&self, days: u32, include_unread: bool) -> Result<Vec<FeedPurged>> {
        let cutoff = cutoff_for(Utc::now(), days);
        let feed_ids = self.db.feed_ids().await?;

        let mut purged = Vec::with_capacity(feed_ids.len());
        for feed_id in feed_ids {
            purged.push(self.purge_at(feed_id, cutoff, include_unread).await?);
        }

        if purged.iter().any(|p| p.deleted > 0) {
            if let Err(e) = self.db.vacuum().await {
                tracing::warn!(error = %e, "Vacuum after purge failed");
            }
        }

        tracing::info!(
            feeds = purged.len(),
            deleted = purged.iter().map(|p| p.deleted).sum::<u64>(),
            cutoff = %cutoff,
            "Feeds purged"
        );
        Ok(purged)
    }

    /// Purge a single feed of items older than `days`.
    pub async fn purge_feed(&self, feed_id: i64, days: u32, include_unread: bool) -> Result<FeedPurged> {
        self.purge_at(feed_id, cutoff_for(Utc::now(), days), include_unread)
            .await
    }

    /// Purge a feed of items published before `cutoff`.
    pub async fn purge_at(
        &self,
        feed_id: i64,
        cutoff: DateTime<Utc>,
        include_unread: bool,
    ) -> Result<FeedPurged> {
        let deleted = self
            .db
            .delete_items_before(feed_id, cutoff, include_unread)
            .await?;
        self.db.set_last_purged(feed_id, cutoff).await?;
        tracing::debug!(feed_id, deleted, "Feed purged");

        Ok(FeedPurged {
            feed_id,
            deleted,
            cutoff,
        })
    }
}

/// `now - days`, saturating at the earliest representable instant.
fn cutoff_for(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::filter::select_new_items;
    use crate::feed::ParsedItem;
    use crate::storage::FeedStore;

    async fn seeded() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let feed_id = db
            .add_feed("https://feed.example.com/rss", Some("Feed"), None)
            .await
            .unwrap();
        let now = Utc::now();
        db.insert_items(
            feed_id,
            &[
                ParsedItem::new("ancient", now - Duration::days(90)),
                ParsedItem::new("recent", now - Duration::days(1)),
            ],
        )
        .await
        .unwrap();
        (db, feed_id)
    }

    #[test]
    fn test_cutoff_for() {
        let now = Utc::now();
        assert_eq!(cutoff_for(now, 0), now);
        assert_eq!(cutoff_for(now, 30), now - Duration::days(30));
    }

    #[test]
    fn test_cutoff_for_saturates_on_huge_age() {
        assert_eq!(cutoff_for(Utc::now(), u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn test_purge_with_huge_age_deletes_nothing() {
        let (db, feed_id) = seeded().await;
        let purger = FeedPurger::new(db.clone());

        let purged = purger.purge_feed(feed_id, u32::MAX, true).await.unwrap();
        assert_eq!(purged.deleted, 0);
        assert_eq!(purged.cutoff, DateTime::<Utc>::MIN_UTC);
        assert_eq!(db.guids_for_feed(feed_id).await.unwrap().len(), 2);

        let meta = db.feed_metadata(feed_id).await.unwrap();
        assert_eq!(meta.last_purged, Some(DateTime::<Utc>::MIN_UTC));
    }

    #[tokio::test]
    async fn test_purge_all_deletes_old_items_and_records_cutoff() {
        let (db, feed_id) = seeded().await;
        let purger = FeedPurger::new(db.clone());

        let purged = purger.purge_all(30, true).await.unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].feed_id, feed_id);
        assert_eq!(purged[0].deleted, 1);

        let guids = db.guids_for_feed(feed_id).await.unwrap();
        assert!(guids.contains("recent"));
        assert!(!guids.contains("ancient"));

        let meta = db.feed_metadata(feed_id).await.unwrap();
        assert_eq!(
            meta.last_purged.map(|t| t.timestamp()),
            Some(purged[0].cutoff.timestamp())
        );
    }

    #[tokio::test]
    async fn test_purge_keeps_unread_unless_asked() {
        let (db, feed_id) = seeded().await;
        let purger = FeedPurger::new(db.clone());

        let purged = purger.purge_feed(feed_id, 30, false).await.unwrap();
        assert_eq!(purged.deleted, 0);
        assert_eq!(db.guids_for_feed(feed_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_purged_items_are_not_resynced() {
        let (db, feed_id) = seeded().await;
        let purger = FeedPurger::new(db.clone());
        purger.purge_feed(feed_id, 30, true).await.unwrap();

        // The feed document still carries the purged item
        let meta = db.feed_metadata(feed_id).await.unwrap();
        let existing = db.existing_guids(feed_id).await.unwrap();
        let incoming = vec![ParsedItem::new("ancient", Utc::now() - Duration::days(90))];

        let fresh = select_new_items(incoming, &existing, meta.last_updated, meta.last_purged);
        assert!(fresh.is_empty());
    }
}
