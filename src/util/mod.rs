//! Small helpers shared by the sync and prefetch actors.
//!
//! - **URL resolution**: turning `<img src>` references into fetchable URLs
//! - **Panic capture**: reporting worker panics instead of losing them

mod task;
mod url;

pub use self::task::catch_task_panic;
pub use self::url::{resolve_image_url, ResolveError};
