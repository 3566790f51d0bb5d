//! Raster decode and lossy WebP encode.

use crate::{Error, Result};
use image::{DynamicImage, Rgb, RgbImage};

/// libwebp rejects dimensions above this.
const MAX_WEBP_DIMENSION: u32 = 16383;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebpOptions {
    /// 0-100, passed straight to the lossy encoder.
    pub quality: f32,
    /// Composite onto opaque white and drop the alpha channel.
    pub flatten: bool,
}

impl WebpOptions {
    /// Photographic output for the editor: white background, quality 85.
    pub fn photo() -> Self {
        Self {
            quality: 85.0,
            flatten: true,
        }
    }

    /// Uploaded files keep their alpha channel.
    pub fn upload() -> Self {
        Self {
            quality: 80.0,
            flatten: false,
        }
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality.clamp(0.0, 100.0);
        self
    }
}

/// Decode any supported image format and re-encode it as lossy WebP.
pub fn encode_webp(bytes: &[u8], options: WebpOptions) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());

    if width == 0 || height == 0 || width > MAX_WEBP_DIMENSION || height > MAX_WEBP_DIMENSION {
        return Err(Error::Conversion(format!(
            "Image dimensions {}x{} cannot be encoded as WebP",
            width, height
        )));
    }

    let encoded = if options.flatten {
        let rgb = flatten_onto_white(&img);
        encode_lossy(
            webp::Encoder::from_rgb(rgb.as_raw(), width, height),
            options.quality,
        )?
    } else {
        let rgba = img.to_rgba8();
        encode_lossy(
            webp::Encoder::from_rgba(rgba.as_raw(), width, height),
            options.quality,
        )?
    };

    tracing::debug!(
        "Encoded {}x{} image as WebP: {} -> {} bytes",
        width,
        height,
        bytes.len(),
        encoded.len()
    );

    Ok(encoded)
}

fn encode_lossy(encoder: webp::Encoder<'_>, quality: f32) -> Result<Vec<u8>> {
    encoder
        .encode_simple(false, quality)
        .map(|memory| memory.to_vec())
        .map_err(|e| Error::Conversion(format!("WebP encoding failed: {:?}", e)))
}

/// Alpha-composite the image over an opaque white canvas.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut canvas = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        canvas.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::mime::sniff_image_mime;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(img: RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_flatten_transparent_pixel_becomes_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0])));
        let flat = flatten_onto_white(&img);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_flatten_opaque_pixel_is_unchanged() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let flat = flatten_onto_white(&img);
        assert_eq!(flat.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_flatten_half_transparent_black_is_grey() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128])));
        let flat = flatten_onto_white(&img);
        let [r, g, b] = flat.get_pixel(0, 0).0;
        assert!((125..=129).contains(&r));
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_encode_png_to_webp() {
        let png = png_bytes(RgbaImage::from_pixel(16, 12, Rgba([200, 100, 50, 255])));
        let webp = encode_webp(&png, WebpOptions::photo()).unwrap();

        assert_eq!(sniff_image_mime(&webp), "image/webp");
        let decoded = image::load_from_memory(&webp).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[test]
    fn test_encode_flattened_transparent_image_is_white() {
        let png = png_bytes(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let webp = encode_webp(&png, WebpOptions::photo()).unwrap();

        let decoded = image::load_from_memory(&webp).unwrap().to_rgb8();
        let [r, g, b] = decoded.get_pixel(4, 4).0;
        assert!(r > 240 && g > 240 && b > 240);
    }

    #[test]
    fn test_encode_rejects_non_image_bytes() {
        let err = encode_webp(b"definitely not an image", WebpOptions::photo()).unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn test_with_quality_clamps() {
        assert_eq!(WebpOptions::photo().with_quality(150.0).quality, 100.0);
        assert_eq!(WebpOptions::upload().with_quality(-1.0).quality, 0.0);
    }
}
