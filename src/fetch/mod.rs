//! Network retrieval for feed documents, images and enclosures.
//!
//! Everything here follows one contract: a retrieval never fails outward.
//! [`ResourceFetcher`] logs what went wrong and returns an empty body (or
//! [`Image::empty`]), so the sync queue and the prefetch loop treat failure
//! as "got nothing" and carry on.
//!
//! - [`resource`] - the [`Fetch`] seam and its `reqwest` implementation
//! - [`proxy`] - forward proxy settings with basic-auth credentials
//! - [`image`](self::image) - fetched image bytes with format sniffing
//! - [`enclosure`] - saving media enclosures to disk

mod enclosure;
mod image;
mod proxy;
mod resource;

pub use enclosure::{download_enclosure, enclosure_file_name, EnclosureDownload, EnclosureError};
pub use self::image::{Image, ImageFormat};
pub use proxy::ProxyConfig;
pub use resource::{Fetch, FetchError, FetchSettings, ResourceFetcher, DEFAULT_USER_AGENT};
