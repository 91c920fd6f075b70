use chrono::{DateTime, Utc};

/// A media attachment on a feed item (a podcast episode, for instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    /// Declared length in bytes, 0 when the feed omits it.
    pub length: u64,
    /// Declared MIME type, e.g. `audio/mpeg`.
    pub mime_type: String,
}

/// One item parsed out of a feed document.
///
/// Synchronization only inspects `guid` (deduplication) and `published`
/// (date filtering). The remaining fields are carried through to storage
/// and image discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub guid: String,
    pub title: String,
    pub author: String,
    pub link: String,
    pub description: String,
    /// Full article body (`content:encoded` in RSS) when the feed ships one.
    pub content: String,
    pub categories: Vec<String>,
    pub published: DateTime<Utc>,
    pub thumbnail: Option<String>,
    pub enclosure: Option<Enclosure>,
}

impl ParsedItem {
    /// Minimal item with only the fields synchronization looks at.
    pub fn new(guid: impl Into<String>, published: DateTime<Utc>) -> Self {
        Self {
            guid: guid.into(),
            title: String::new(),
            author: String::new(),
            link: String::new(),
            description: String::new(),
            content: String::new(),
            categories: Vec::new(),
            published,
            thumbnail: None,
            enclosure: None,
        }
    }

    /// The HTML body to show: encoded content if present, else the description.
    pub fn body_html(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.description
        } else {
            &self.content
        }
    }

    pub fn has_enclosure(&self) -> bool {
        self.enclosure.is_some()
    }
}
