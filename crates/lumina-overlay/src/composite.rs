//! Base-frame drawing, overlay compositing and image export.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("frame size mismatch: expected {expected} bytes for {width}x{height} RGB, got {actual}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("overlay is {overlay:?} but base frame is {base:?}")]
    SizeMismatch { base: (u32, u32), overlay: (u32, u32) },
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("invalid font: {0}")]
    InvalidFont(String),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Copy an RGB frame into an opaque RGBA image, mirrored horizontally if requested.
pub fn draw_base_frame(rgb: &[u8], width: u32, height: u32, mirrored: bool) -> Result<RgbaImage, OverlayError> {
    let mut image = RgbaImage::new(width, height);
    draw_base_frame_into(&mut image, rgb, width, height, mirrored)?;
    Ok(image)
}

/// Like [`draw_base_frame`], but writes into `target`.
///
/// `target` is reallocated only when its size differs from the frame.
pub fn draw_base_frame_into(
    target: &mut RgbaImage,
    rgb: &[u8],
    width: u32,
    height: u32,
    mirrored: bool,
) -> Result<(), OverlayError> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(OverlayError::FrameSize {
            width,
            height,
            expected,
            actual: rgb.len(),
        });
    }
    if target.dimensions() != (width, height) {
        *target = RgbaImage::new(width, height);
    }
    let w = width as usize;
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (x, y) = (i % w, i / w);
        let x = if mirrored { w - 1 - x } else { x };
        target.put_pixel(x as u32, y as u32, Rgba([px[0], px[1], px[2], 255]));
    }
    Ok(())
}

/// Alpha-composite `overlay` on top of `base`.
pub fn composite(base: &RgbaImage, overlay: &RgbaImage) -> Result<RgbaImage, OverlayError> {
    if base.dimensions() != overlay.dimensions() {
        return Err(OverlayError::SizeMismatch {
            base: base.dimensions(),
            overlay: overlay.dimensions(),
        });
    }
    let mut out = base.clone();
    imageops::overlay(&mut out, overlay, 0, 0);
    Ok(out)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, OverlayError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Encode as JPEG (alpha dropped) and wrap in a `data:image/jpeg;base64,` URI.
pub fn encode_jpeg_data_uri(image: &RgbaImage, quality: u8) -> Result<String, OverlayError> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buf)))
}

/// Decode a `data:image/...;base64,` URI back into an image.
pub fn decode_data_uri(uri: &str) -> Result<DynamicImage, OverlayError> {
    let (_, payload) = uri
        .split_once(";base64,")
        .ok_or_else(|| OverlayError::InvalidDataUri("missing ';base64,' marker".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| OverlayError::InvalidDataUri(e.to_string()))?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Load a TrueType/OpenType font for raster text.
pub fn load_font(path: &std::path::Path) -> Result<ab_glyph::FontArc, OverlayError> {
    let bytes = std::fs::read(path).map_err(|e| OverlayError::InvalidFont(format!("{}: {e}", path.display())))?;
    let font = ab_glyph::FontArc::try_from_vec(bytes)
        .map_err(|e| OverlayError::InvalidFont(format!("{}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "overlay font loaded");
    Ok(font)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn two_pixel_frame() -> Vec<u8> {
        // left red, right blue
        vec![255, 0, 0, 0, 0, 255]
    }

    #[test]
    fn test_base_frame_mirrors() {
        let plain = draw_base_frame(&two_pixel_frame(), 2, 1, false).unwrap();
        assert_eq!(plain.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        let mirrored = draw_base_frame(&two_pixel_frame(), 2, 1, true).unwrap();
        assert_eq!(mirrored.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_base_frame_rejects_bad_length() {
        assert!(matches!(
            draw_base_frame(&[0; 5], 2, 1, false),
            Err(OverlayError::FrameSize { expected: 6, actual: 5, .. })
        ));
    }

    #[test]
    fn test_base_frame_into_reuses_buffer() {
        let mut target = RgbaImage::new(2, 1);
        let buffer = target.as_raw().as_ptr();
        draw_base_frame_into(&mut target, &two_pixel_frame(), 2, 1, true).unwrap();
        assert_eq!(target.as_raw().as_ptr(), buffer);
        assert_eq!(target.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));

        // a new size replaces the buffer
        draw_base_frame_into(&mut target, &[7; 12], 2, 2, false).unwrap();
        assert_eq!(target.dimensions(), (2, 2));
        assert_eq!(target.get_pixel(1, 1), &Rgba([7, 7, 7, 255]));
    }

    #[test]
    fn test_composite_keeps_base_where_transparent() {
        let base = draw_base_frame(&two_pixel_frame(), 2, 1, false).unwrap();
        let mut overlay = RgbaImage::new(2, 1);
        overlay.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let out = composite(&base, &overlay).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_composite_size_mismatch() {
        let base = RgbaImage::new(2, 2);
        let overlay = RgbaImage::new(3, 2);
        assert!(matches!(composite(&base, &overlay), Err(OverlayError::SizeMismatch { .. })));
    }

    #[test]
    fn test_png_signature() {
        let png = encode_png(&RgbaImage::new(4, 4)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_jpeg_data_uri_decodes() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
        let uri = encode_jpeg_data_uri(&img, 85).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,/9j/"));
        let back = decode_data_uri(&uri).unwrap();
        assert_eq!((back.width(), back.height()), (8, 8));
    }

    #[test]
    fn test_decode_rejects_plain_string() {
        assert!(matches!(decode_data_uri("hello"), Err(OverlayError::InvalidDataUri(_))));
        assert!(matches!(
            decode_data_uri("data:image/jpeg;base64,@@@"),
            Err(OverlayError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn test_load_font_missing_file() {
        assert!(matches!(
            load_font(std::path::Path::new("/nonexistent/font.ttf")),
            Err(OverlayError::InvalidFont(_))
        ));
    }
}
