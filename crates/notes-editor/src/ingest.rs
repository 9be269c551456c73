//! Paste and drop ingestion: URL detection, image compression, clipboard
//! image copy.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::config::SessionConfig;
use crate::fetch::ImageFile;

/// How a plain-text paste is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteKind {
    /// One URL-shaped token; resolve metadata for `url` (always https).
    LinkPreview { url: String, raw: String },
    PlainText(String),
}

/// Recognize a paste that is exactly one `http(s)://` or `www.` token.
pub fn classify_paste(text: &str) -> PasteKind {
    let token = text.trim();
    let single = !token.is_empty() && !token.chars().any(char::is_whitespace);
    if single {
        if let Some(url) = normalize_pasted_url(token) {
            return PasteKind::LinkPreview {
                url,
                raw: token.to_string(),
            };
        }
    }
    PasteKind::PlainText(text.to_string())
}

fn normalize_pasted_url(token: &str) -> Option<String> {
    let lower = token.to_ascii_lowercase();
    let rest = if lower.starts_with("https://") {
        &token["https://".len()..]
    } else if lower.starts_with("http://") {
        &token["http://".len()..]
    } else if lower.starts_with("www.") {
        token
    } else {
        return None;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.eq_ignore_ascii_case("www.") {
        return None;
    }
    Some(format!("https://{rest}"))
}

/// Compression settings, taken from [`SessionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub threshold_bytes: usize,
    pub max_edge: u32,
    pub quality: u8,
}

impl From<&SessionConfig> for Compression {
    fn from(config: &SessionConfig) -> Self {
        Self {
            threshold_bytes: config.compress_threshold_bytes,
            max_edge: config.compress_max_edge,
            quality: config.compress_quality.clamp(1, 100),
        }
    }
}

fn jpeg_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!("{}.jpg", if stem.is_empty() { "image" } else { stem })
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out.into_inner())
}

/// Downscale and re-encode large images before upload. The file comes back
/// untouched when it is small, cannot be decoded, or would not shrink.
pub fn compress_image(file: ImageFile, settings: Compression) -> ImageFile {
    if file.bytes.len() <= settings.threshold_bytes || file.mime == "image/gif" {
        return file;
    }
    let decoded = match image::load_from_memory(&file.bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::debug!(name = %file.name, "image not compressible: {err}");
            return file;
        }
    };
    let (width, height) = decoded.dimensions();
    let scaled = if width.max(height) > settings.max_edge {
        decoded.resize(settings.max_edge, settings.max_edge, FilterType::Triangle)
    } else {
        decoded
    };
    match encode_jpeg(&scaled, settings.quality) {
        Ok(bytes) if bytes.len() < file.bytes.len() => {
            tracing::debug!(
                name = %file.name,
                before = file.bytes.len(),
                after = bytes.len(),
                "image compressed"
            );
            ImageFile::new(jpeg_name(&file.name), "image/jpeg", bytes)
        }
        Ok(_) => file,
        Err(err) => {
            tracing::debug!(name = %file.name, "image re-encode failed: {err}");
            file
        }
    }
}

/// Short-lived message for the host to show, e.g. as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The system clipboard, as far as image copy needs it.
pub trait ClipboardSink {
    fn write_image(&mut self, src: &str) -> Result<(), String>;
}

/// Copy an image to the clipboard. Failures become a [`Notice`].
pub fn copy_image(sink: &mut dyn ClipboardSink, src: &str) -> Option<Notice> {
    match sink.write_image(src) {
        Ok(()) => None,
        Err(err) => {
            tracing::debug!(src, "clipboard unavailable: {err}");
            Some(Notice::new("Copying images is not supported here"))
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, RgbaImage};

    use super::*;

    #[test]
    fn url_shapes() {
        assert_eq!(normalize_pasted_url("www.ft.com/x").as_deref(), Some("https://www.ft.com/x"));
        assert_eq!(normalize_pasted_url("http://a.io").as_deref(), Some("https://a.io"));
        assert_eq!(normalize_pasted_url("HTTPS://a.io").as_deref(), Some("https://a.io"));
        assert_eq!(normalize_pasted_url("https://"), None);
        assert_eq!(normalize_pasted_url("ftp://a.io"), None);
        assert_eq!(normalize_pasted_url("example.com"), None);
    }

    #[test]
    fn jpeg_names() {
        assert_eq!(jpeg_name("chart.png"), "chart.jpg");
        assert_eq!(jpeg_name("scan"), "scan.jpg");
        assert_eq!(jpeg_name(".png"), "image.jpg");
    }

    fn noisy_png(size: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(size, size, |x, y| {
            let v = ((x * 31) ^ (y * 17)) as u8;
            image::Rgba([v, v.wrapping_mul(3), v.wrapping_add(90), 255])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn large_images_are_downscaled() {
        let bytes = noisy_png(400);
        let settings = Compression {
            threshold_bytes: 1_000,
            max_edge: 100,
            quality: 80,
        };
        let out = compress_image(ImageFile::new("big.png", "image/png", bytes.clone()), settings);
        assert_eq!(out.mime, "image/jpeg");
        assert_eq!(out.name, "big.jpg");
        assert!(out.bytes.len() < bytes.len());
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 100));
    }

    #[test]
    fn small_or_broken_files_pass_through() {
        let settings = Compression {
            threshold_bytes: 10,
            max_edge: 100,
            quality: 80,
        };
        let broken = ImageFile::new("x.png", "image/png", vec![0; 64]);
        assert_eq!(compress_image(broken.clone(), settings), broken);

        let small = ImageFile::new("y.png", "image/png", vec![0; 4]);
        assert_eq!(compress_image(small.clone(), settings), small);
    }
}
