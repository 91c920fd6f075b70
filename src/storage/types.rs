use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::{Enclosure, ParsedItem};

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another instance of feedsync appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

/// Failures reported by a [`FeedStore`](super::FeedStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Feed {0} not found")]
    NotFound(i64),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend(format!("{err:#}"))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// What synchronization needs to know about a feed before fetching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMetadata {
    pub url: String,
    /// Home page of the feed, used to resolve relative image links.
    pub web_page_link: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_purged: Option<DateTime<Utc>>,
}

/// A subscribed feed with item counts.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub web_page_link: Option<String>,
    pub date_added: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_purged: Option<DateTime<Utc>>,
    pub item_count: i64,
    pub unread_count: i64,
}

impl Feed {
    /// Base used when an item's image reference is relative.
    pub fn base_link(&self) -> &str {
        self.web_page_link.as_deref().unwrap_or(&self.url)
    }
}

/// An item as persisted, with its row id and read state.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub id: i64,
    pub feed_id: i64,
    pub read: bool,
    pub item: ParsedItem,
}

// ============================================================================
// Helper Types
// ============================================================================

/// Row type for feed listing with counts
pub(crate) type FeedRow = (
    i64,
    String,
    String,
    Option<String>,
    i64,
    Option<i64>,
    Option<i64>,
    i64,
    i64,
);

/// Internal row type for item queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub author: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub categories: String,
    pub published: i64,
    pub thumbnail: Option<String>,
    pub enclosure_url: Option<String>,
    pub enclosure_length: Option<i64>,
    pub enclosure_type: Option<String>,
    pub read: bool,
}

/// Separator for the categories column.
pub(crate) const CATEGORY_SEPARATOR: char = '\n';

impl ItemDbRow {
    pub(crate) fn into_stored(self) -> StoredItem {
        let enclosure = self.enclosure_url.map(|url| Enclosure {
            url,
            length: self.enclosure_length.unwrap_or(0).max(0) as u64,
            mime_type: self.enclosure_type.unwrap_or_default(),
        });
        let categories = self
            .categories
            .split(CATEGORY_SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        StoredItem {
            id: self.id,
            feed_id: self.feed_id,
            read: self.read,
            item: ParsedItem {
                guid: self.guid,
                title: self.title,
                author: self.author,
                link: self.link,
                description: self.description,
                content: self.content,
                categories,
                published: from_timestamp(self.published).unwrap_or_default(),
                thumbnail: self.thumbnail,
                enclosure,
            },
        }
    }
}

pub(crate) fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}
