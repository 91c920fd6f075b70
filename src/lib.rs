//! feedsync: sequential feed synchronization with windowed image
//! prefetching and a bounded in-memory image cache.

pub mod config;
pub mod feed;
pub mod fetch;
pub mod images;
pub mod storage;
pub mod util;
