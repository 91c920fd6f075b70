use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::item::ParsedItem;

/// Keep only the items that are new to the store.
///
/// An item is new when its guid is not in `existing_guids` (nor repeated
/// earlier in the same batch) and it was published strictly after every
/// known threshold. Requiring it to beat `last_purged` as well as
/// `last_updated` keeps purged items from coming back on the next sync.
///
/// Order is preserved.
pub fn select_new_items(
    items: Vec<ParsedItem>,
    existing_guids: &HashSet<String>,
    last_updated: Option<DateTime<Utc>>,
    last_purged: Option<DateTime<Utc>>,
) -> Vec<ParsedItem> {
    let mut seen: HashSet<String> = HashSet::new();

    items
        .into_iter()
        .filter(|item| !existing_guids.contains(&item.guid))
        .filter(|item| last_updated.map_or(true, |threshold| item.published > threshold))
        .filter(|item| last_purged.map_or(true, |threshold| item.published > threshold))
        .filter(|item| seen.insert(item.guid.clone()))
        .collect()
}
