//! Persistence for feeds and their items.
//!
//! [`FeedStore`] is the narrow seam the sync coordinator talks to;
//! [`Database`] is its SQLite implementation and also carries the extra
//! operations the command line needs (subscribing, listing, purging).

mod feeds;
mod items;
mod schema;
mod store;
mod types;

pub use schema::Database;
pub use store::FeedStore;
pub use types::{DatabaseError, Feed, FeedMetadata, StoreError, StoredItem};
