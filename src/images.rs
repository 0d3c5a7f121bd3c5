//! Recipe image checks and storage keys.

use std::path::Path;

use image::ImageFormat;
use uuid::Uuid;

pub const UPLOAD_DIR: &str = "uploads/recipe";

/// The payload's format, provided it actually decodes as an image.
pub fn detect_image(bytes: &[u8]) -> Option<ImageFormat> {
    let format = image::guess_format(bytes).ok()?;
    image::load_from_memory_with_format(bytes, format).ok()?;
    Some(format)
}

/// `uploads/recipe/<uuid>.<ext>`: the extension of the uploaded file name when
/// there is one, otherwise the detected format's usual extension.
pub fn recipe_image_key(file_name: Option<&str>, format: ImageFormat) -> String {
    let ext = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .or_else(|| ext_from_format(format).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", UPLOAD_DIR, Uuid::new_v4(), ext)
}

fn ext_from_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::Bmp => Some("bmp"),
        other => other.extensions_str().first().copied(),
    }
}

#[cfg(test)]
pub(crate) fn png_bytes() -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbImage::from_pixel(10, 10, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
