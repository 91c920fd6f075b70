use std::sync::Arc;

/// Format of a fetched image.
///
/// Raster formats are identified by the `image` crate from their magic
/// bytes. SVG is text, so it gets a separate sniff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Raster(::image::ImageFormat),
    Svg,
}

impl ImageFormat {
    /// Sniff the format from the first bytes of a payload.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if let Ok(format) = ::image::guess_format(bytes) {
            return Some(Self::Raster(format));
        }
        is_svg(bytes).then_some(Self::Svg)
    }

    pub fn mime_type(self) -> &'static str {
        use ::image::ImageFormat as Raster;

        match self {
            Self::Svg => "image/svg+xml",
            Self::Raster(Raster::Png) => "image/png",
            Self::Raster(Raster::Jpeg) => "image/jpeg",
            Self::Raster(Raster::Gif) => "image/gif",
            Self::Raster(Raster::WebP) => "image/webp",
            Self::Raster(Raster::Avif) => "image/avif",
            Self::Raster(Raster::Bmp) => "image/bmp",
            Self::Raster(Raster::Ico) => "image/x-icon",
            Self::Raster(Raster::Tiff) => "image/tiff",
            Self::Raster(_) => "application/octet-stream",
        }
    }
}

/// Skip BOM, whitespace and an XML prolog, then look for the root tag.
fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && trimmed.contains("<svg"))
}

/// Raw image bytes plus the detected format.
///
/// `Image::empty()` is the failure value returned by image fetches; it is
/// never stored in the image cache. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    data: Arc<[u8]>,
    format: Option<ImageFormat>,
}

impl Image {
    pub fn empty() -> Self {
        Self {
            data: Arc::from(Vec::<u8>::new()),
            format: None,
        }
    }

    /// Wrap fetched bytes. Payloads that are not a recognizable image
    /// (an HTML error page served with 200, for instance) become empty.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match ImageFormat::detect(&bytes) {
            Some(format) => Self {
                data: Arc::from(bytes),
                format: Some(format),
            },
            None => Self::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::empty()
    }
}
