use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::error::ImageError;
use image::{DynamicImage, ImageEncoder, ImageFormat, ImageReader, Limits};
use tracing::{debug, instrument};

use crate::error::MosaicError;

/// Upper bounds applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum decoded width in pixels.
    pub max_width: u32,
    /// Maximum decoded height in pixels.
    pub max_height: u32,
    /// Maximum bytes the decoder may allocate.
    pub max_alloc: u64,
}

impl DecodeLimits {
    /// Limits with the same bound on both axes and the default allocation cap.
    pub fn square(max_dimension: u32) -> Self {
        Self {
            max_width: max_dimension,
            max_height: max_dimension,
            ..Self::default()
        }
    }

    fn to_image_limits(self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_width);
        limits.max_image_height = Some(self.max_height);
        limits.max_alloc = Some(self.max_alloc);
        limits
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: 8192,
            max_height: 8192,
            max_alloc: 512 * 1024 * 1024,
        }
    }
}

/// Decode input bytes into an 8-bit `DynamicImage`.
///
/// The format is sniffed from the buffer header. Wider sample types are
/// narrowed to 8 bits so every later stage sees `L8`, `La8`, `Rgb8` or `Rgba8`.
#[instrument(skip(input), fields(input_len = input.len()))]
pub fn decode_image(input: &[u8], limits: &DecodeLimits) -> Result<DynamicImage, MosaicError> {
    if input.is_empty() {
        return Err(MosaicError::Decode("empty input".into()));
    }

    let mut reader = ImageReader::new(Cursor::new(input))
        .with_guessed_format()
        .map_err(|e| MosaicError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(MosaicError::UnsupportedFormat);
    }
    reader.limits(limits.to_image_limits());

    let decoded = reader.decode().map_err(|e| match e {
        ImageError::Limits(limit) => MosaicError::DimensionsExceeded(limit.to_string()),
        ImageError::Unsupported(_) => MosaicError::UnsupportedFormat,
        other => MosaicError::Decode(other.to_string()),
    })?;

    debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "image decoded"
    );
    Ok(to_eight_bit(decoded))
}

fn to_eight_bit(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image,
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
        DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Encode an image as lossless PNG.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, MosaicError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MosaicError::Encode("image dimensions are zero".into()));
    }

    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_bytes(),
            image.width(),
            image.height(),
            image.color().into(),
        )
        .map_err(|e| MosaicError::Encode(e.to_string()))?;

    debug!(output_len = buffer.len(), "image encoded as PNG");
    Ok(buffer)
}

/// Detect the input image format from the raw bytes.
pub fn detect_format(input: &[u8]) -> Result<ImageFormat, MosaicError> {
    image::guess_format(input).map_err(|e| MosaicError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn make_test_rgb(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ]);
        }
        img
    }

    #[test]
    fn png_round_trip_preserves_rgb() {
        let original = DynamicImage::ImageRgb8(make_test_rgb(17, 9));
        let data = encode_png(&original).unwrap();
        let decoded = decode_image(&data, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded.width(), 17);
        assert_eq!(decoded.height(), 9);
        assert_eq!(decoded.color(), original.color());
        assert_eq!(decoded.as_bytes(), original.as_bytes());
    }

    #[test]
    fn png_round_trip_preserves_gray_and_alpha() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(5, 3, Luma([42])));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 5, Rgba([1, 2, 3, 4])));
        for original in [gray, rgba] {
            let data = encode_png(&original).unwrap();
            let decoded = decode_image(&data, &DecodeLimits::default()).unwrap();
            assert_eq!(decoded.dimensions(), original.dimensions());
            assert_eq!(
                decoded.color().channel_count(),
                original.color().channel_count()
            );
        }
    }

    #[test]
    fn png_output_has_signature() {
        let data = encode_png(&DynamicImage::ImageRgb8(make_test_rgb(4, 4))).unwrap();
        assert_eq!(&data[0..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(detect_format(&data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn encode_zero_sized_is_error() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 4));
        assert!(matches!(encode_png(&empty), Err(MosaicError::Encode(_))));
    }

    #[test]
    fn empty_input_is_decode_error() {
        let result = decode_image(&[], &DecodeLimits::default());
        assert!(matches!(result, Err(MosaicError::Decode(_))));
    }

    #[test]
    fn garbage_input_is_rejected() {
        let result = decode_image(b"not an image", &DecodeLimits::default());
        assert!(matches!(result, Err(MosaicError::UnsupportedFormat)));
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let data = encode_png(&DynamicImage::ImageRgb8(make_test_rgb(32, 32))).unwrap();
        let result = decode_image(&data[..data.len() / 2], &DecodeLimits::default());
        assert!(matches!(result, Err(MosaicError::Decode(_))));
    }

    #[test]
    fn oversized_image_hits_limits() {
        let data = encode_png(&DynamicImage::ImageRgb8(make_test_rgb(64, 16))).unwrap();
        let result = decode_image(&data, &DecodeLimits::square(32));
        assert!(matches!(result, Err(MosaicError::DimensionsExceeded(_))));
    }

    #[test]
    fn sixteen_bit_input_is_narrowed() {
        let wide = DynamicImage::ImageRgb8(make_test_rgb(4, 4)).to_rgb16();
        let narrowed = to_eight_bit(DynamicImage::ImageRgb16(wide));
        assert_eq!(narrowed.color(), image::ColorType::Rgb8);
    }
}
