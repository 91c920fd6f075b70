use scraper::{Html, Selector};
use std::sync::OnceLock;

use crate::feed::ParsedItem;

fn img_selector() -> Option<&'static Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("img").ok()).as_ref()
}

/// `src` values of every `<img>` tag in `html`, in document order.
///
/// Tags without a `src` (or with an empty one) are skipped. Values are
/// returned verbatim; resolving them is the fetcher's job.
pub fn find_images(html: &str) -> Vec<String> {
    let Some(selector) = img_selector() else {
        return Vec::new();
    };

    Html::parse_fragment(html)
        .select(selector)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Every image an item would display: its body's `<img>` tags followed by
/// its thumbnail.
pub fn item_image_urls(item: &ParsedItem) -> Vec<String> {
    let mut urls = find_images(item.body_html());
    if let Some(thumbnail) = item.thumbnail.as_deref() {
        if !thumbnail.trim().is_empty() {
            urls.push(thumbnail.to_string());
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_finds_img_sources_in_order() {
        let html = r#"
            <p>Intro <img src="https://cdn.example.com/a.png" alt="a"></p>
            <div><img alt="no source"><img src=""><IMG SRC="/b.jpg"></div>
            <picture><img src="//img.example.com/c.gif"/></picture>
        "#;
        assert_eq!(
            find_images(html),
            vec![
                "https://cdn.example.com/a.png".to_string(),
                "/b.jpg".to_string(),
                "//img.example.com/c.gif".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_images() {
        assert!(find_images("<p>plain text</p>").is_empty());
        assert!(find_images("").is_empty());
        assert!(find_images("not even <html").is_empty());
    }

    #[test]
    fn test_item_uses_content_then_description() {
        let mut item = ParsedItem::new("g", Utc::now());
        item.description = r#"<img src="desc.png">"#.to_string();
        assert_eq!(item_image_urls(&item), vec!["desc.png".to_string()]);

        item.content = r#"<img src="body.png">"#.to_string();
        item.thumbnail = Some("https://cdn.example.com/thumb.jpg".to_string());
        assert_eq!(
            item_image_urls(&item),
            vec![
                "body.png".to_string(),
                "https://cdn.example.com/thumb.jpg".to_string()
            ]
        );
    }
}
