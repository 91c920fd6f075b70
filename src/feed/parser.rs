use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use sha2::{Digest, Sha256};

use super::item::{Enclosure, ParsedItem};

/// Turns a fetched feed document into items.
///
/// Parsing never fails outward: malformed or empty input yields an empty
/// list, which synchronization treats as "no new items".
pub trait FeedParser: Send + Sync + 'static {
    fn parse(&self, bytes: &[u8]) -> Vec<ParsedItem>;
}

/// RSS 0.9x/1.0/2.0, Atom and JSON Feed parser backed by `feed-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RssParser;

impl FeedParser for RssParser {
    fn parse(&self, bytes: &[u8]) -> Vec<ParsedItem> {
        parse_items(bytes, Utc::now())
    }
}

/// Parse `bytes`, stamping items that carry no date with `parsed_at`.
pub fn parse_items(bytes: &[u8], parsed_at: DateTime<Utc>) -> Vec<ParsedItem> {
    if bytes.is_empty() {
        return Vec::new();
    }

    // Leave missing entry ids empty so `generate_guid` picks the fallback
    let feed_parser = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build();
    let feed = match feed_parser.parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!(error = %e, bytes = bytes.len(), "Failed to parse feed document");
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .map(|entry| convert_entry(entry, parsed_at))
        .collect()
}

fn convert_entry(entry: Entry, parsed_at: DateTime<Utc>) -> ParsedItem {
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let published = entry.published.or(entry.updated).unwrap_or(parsed_at);
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let author = entry
        .authors
        .first()
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let description = entry.summary.map(|s| s.content).unwrap_or_default();
    let content = entry.content.and_then(|c| c.body).unwrap_or_default();
    let categories = entry
        .categories
        .into_iter()
        .map(|c| c.label.unwrap_or(c.term))
        .collect();

    let mut thumbnail = None;
    let mut enclosure = None;
    for media in &entry.media {
        if thumbnail.is_none() {
            thumbnail = media.thumbnails.first().map(|t| t.image.uri.clone());
        }
        if enclosure.is_none() {
            enclosure = media.content.iter().find_map(|c| {
                c.url.as_ref().map(|url| Enclosure {
                    url: url.to_string(),
                    length: c.size.unwrap_or(0),
                    mime_type: c
                        .content_type
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_default(),
                })
            });
        }
    }

    let existing_id = if entry.id.is_empty() {
        None
    } else {
        Some(entry.id.as_str())
    };
    let guid = generate_guid(existing_id, &link, &title, published);

    ParsedItem {
        guid,
        title,
        author,
        link,
        description,
        content,
        categories,
        published,
        thumbnail,
        enclosure,
    }
}

/// Pick a stable identifier: the feed's own id, then the item link, then a
/// digest of link, title and date.
fn generate_guid(existing: Option<&str>, link: &str, title: &str, published: DateTime<Utc>) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let link = link.trim();
    if !link.is_empty() {
        return link.to_string();
    }

    let input = format!("{}|{}|{}", link, title, published.timestamp());
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
