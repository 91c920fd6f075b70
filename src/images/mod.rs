//! Image prefetching and the in-memory image cache.
//!
//! - [`cache`] - bounded LRU cache keyed by the image reference as written
//! - [`controller`] - windowing that decides which rows to prefetch next
//! - [`finder`] - `<img>` discovery in item HTML
//! - [`prefetcher`] - the background fetch actor with cancel-and-restart
//! - [`session`] - glue from list navigation to the prefetcher

mod cache;
mod controller;
mod finder;
mod prefetcher;
mod session;

pub use cache::{ImageCache, SharedImageCache, DEFAULT_IMAGE_CACHE_CAPACITY};
pub use controller::{PrefetchController, DEFAULT_PREFETCH_RANGE};
pub use finder::{find_images, item_image_urls};
pub use prefetcher::{
    ImagePrefetcher, PrefetchContext, PrefetchEvent, PrefetchHandle, PrefetcherStopped,
};
pub use session::PrefetchSession;
