use thiserror::Error;
use url::Url;

/// Errors that can occur while resolving an image reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Image reference is empty")]
    Empty,
    #[error("Relative image reference {0:?} has no base link to resolve against")]
    MissingBase(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Turn an `<img src>` value into an absolute URL that can be fetched.
///
/// - `http://` and `https://` references are used as-is
/// - protocol-relative `//host/path` references get `https:` prepended
/// - anything else is joined against `base_link` (the item's link)
///
/// The returned URL is only for fetching. Callers keep using the original
/// `src` string as the cache key since rendered HTML refers to it verbatim.
pub fn resolve_image_url(src: &str, base_link: &str) -> Result<Url, ResolveError> {
    let src = src.trim();
    if src.is_empty() {
        return Err(ResolveError::Empty);
    }

    if let Some(rest) = src.strip_prefix("//") {
        return Ok(Url::parse(&format!("https://{rest}"))?);
    }

    match Url::parse(src) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ResolveError::UnsupportedScheme(scheme.to_owned())),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base_link.trim();
            if base.is_empty() {
                return Err(ResolveError::MissingBase(src.to_string()));
            }
            let joined = Url::parse(base)?.join(src)?;
            match joined.scheme() {
                "http" | "https" => Ok(joined),
                scheme => Err(ResolveError::UnsupportedScheme(scheme.to_owned())),
            }
        }
        Err(e) => Err(e.into()),
    }
}
