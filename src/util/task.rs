use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Run a background future, converting a panic into an error message.
///
/// Worker tasks wrap their body in this so a panic is reported over the
/// owning actor's event channel instead of silently killing the task and
/// leaving the actor waiting for a completion that never arrives.
///
/// # Example
///
/// ```ignore
/// tokio::spawn(async move {
///     if let Err(panic_msg) = catch_task_panic(fetch_and_parse(feed)).await {
///         tracing::error!(error = %panic_msg, "Sync worker panicked");
///     }
/// });
/// ```
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic payload".to_string()
            }
        })
}
