use std::io::Cursor;

use anyhow::Context;
use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, ImageFormat};

pub const THUMBNAIL_WIDTH: u32 = 150;
pub const THUMBNAIL_HEIGHT: u32 = 100;
pub const SQUARE_EDGE: u32 = 150;

/// The three encoded buffers stored for one photo set.
pub struct Variants {
    pub original: Bytes,
    pub thumbnail: Bytes,
    pub square: Bytes,
}

/// Render the stored variants from a decoded upload: the re-encoded
/// original, a 150x100 thumbnail (aspect ratio deliberately not preserved)
/// and a 150x150 crop-to-fill square.
pub fn render(image: &DynamicImage, format: ImageFormat) -> anyhow::Result<Variants> {
    let thumbnail = image.resize_exact(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, FilterType::Triangle);
    let square = image.resize_to_fill(SQUARE_EDGE, SQUARE_EDGE, FilterType::Triangle);

    Ok(Variants {
        original: encode(image, format).context("encode original")?,
        thumbnail: encode(&thumbnail, format).context("encode thumbnail")?,
        square: encode(&square, format).context("encode square")?,
    })
}

fn encode(image: &DynamicImage, format: ImageFormat) -> anyhow::Result<Bytes> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buf, format)?
        }
        _ => image.write_to(&mut buf, format)?,
    }
    Ok(Bytes::from(buf.into_inner()))
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Encode a small gradient image, for tests that need real image bytes.
    pub fn encode_test_image(width: u32, height: u32, format: ImageFormat) -> Bytes {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        encode(&DynamicImage::ImageRgb8(img), format).expect("encode test image")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::encode_test_image;
    use super::*;

    #[test]
    fn render_produces_expected_dimensions() {
        let bytes = encode_test_image(200, 200, ImageFormat::Png);
        let image = image::load_from_memory(&bytes).unwrap();
        let variants = render(&image, ImageFormat::Png).unwrap();

        let original = image::load_from_memory(&variants.original).unwrap();
        assert_eq!((original.width(), original.height()), (200, 200));

        let thumbnail = image::load_from_memory(&variants.thumbnail).unwrap();
        assert_eq!(
            (thumbnail.width(), thumbnail.height()),
            (THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT)
        );

        let square = image::load_from_memory(&variants.square).unwrap();
        assert_eq!((square.width(), square.height()), (SQUARE_EDGE, SQUARE_EDGE));
    }

    #[test]
    fn thumbnail_ignores_aspect_ratio() {
        // A wide source still comes out at exactly 150x100.
        let bytes = encode_test_image(400, 100, ImageFormat::Png);
        let image = image::load_from_memory(&bytes).unwrap();
        let variants = render(&image, ImageFormat::Png).unwrap();
        let thumbnail = image::load_from_memory(&variants.thumbnail).unwrap();
        assert_eq!((thumbnail.width(), thumbnail.height()), (150, 100));
    }

    #[test]
    fn jpeg_encoding_handles_alpha_sources() {
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            64,
            64,
            image::Rgba([10, 20, 30, 255]),
        ));
        let variants = render(&rgba, ImageFormat::Jpeg).unwrap();
        let decoded = image::load_from_memory(&variants.original).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }
}
