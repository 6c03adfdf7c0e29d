use std::fs;
use std::io::BufWriter;
use std::path::Path;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage, RgbaImage};
use url::Url;

use crate::error::{ComposeError, ComposeResult};
use crate::fetch::fetch_bytes;

pub const JPEG_QUALITY: u8 = 75;

/// Source of decoded images for backgrounds, overlays and portraits.
pub trait ImageLoader {
    fn load_image(&self, reference: &str) -> ComposeResult<RgbaImage>;
}

/// Loads local files, and remote URLs when the `remote` feature is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageLoader;

impl ImageLoader for FsImageLoader {
    fn load_image(&self, reference: &str) -> ComposeResult<RgbaImage> {
        if is_url(reference) {
            let fetched = fetch_bytes(reference)?;
            let format = fetched
                .content_type
                .as_deref()
                .and_then(format_for_content_type)
                .unwrap_or_else(|| format_for_reference(reference));
            return decode_image(&fetched.bytes, format, reference);
        }

        let path = Path::new(reference);
        let bytes = fs::read(path).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        decode_image(&bytes, format_for_reference(reference), reference)
    }
}

pub fn is_url(reference: &str) -> bool {
    Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Lowercased file extension of a path or URL, ignoring any query string.
pub fn reference_extension(reference: &str) -> Option<String> {
    let path = match Url::parse(reference) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url.path().to_owned(),
        _ => reference.to_owned(),
    };
    Path::new(&path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Decoder choice by extension; anything unrecognised is treated as JPEG.
pub fn format_for_reference(reference: &str) -> ImageFormat {
    match reference_extension(reference).as_deref() {
        Some("png") => ImageFormat::Png,
        Some("webp") => ImageFormat::WebP,
        _ => ImageFormat::Jpeg,
    }
}

pub fn format_for_content_type(content_type: &str) -> Option<ImageFormat> {
    match content_type {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

pub fn decode_image(bytes: &[u8], format: ImageFormat, reference: &str) -> ComposeResult<RgbaImage> {
    image::load_from_memory_with_format(bytes, format)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|source| ComposeError::Decode {
            reference: reference.to_owned(),
            source,
        })
}

pub fn ensure_parent_dir(path: &Path) -> ComposeResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ComposeError::Write {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Writes the canvas as a baseline JPEG; alpha is dropped.
pub fn persist_canvas(canvas: &RgbaImage, path: &Path) -> ComposeResult<()> {
    let file = fs::File::create(path).map_err(|source| ComposeError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let rgb: RgbImage = canvas.convert();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(
        BufWriter::new(file),
        JPEG_QUALITY,
    ))
    .map_err(|source| ComposeError::Encode {
        path: path.to_path_buf(),
        source,
    })
}
