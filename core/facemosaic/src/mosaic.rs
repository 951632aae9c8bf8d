use image::imageops::{self, FilterType};
use image::DynamicImage;
use tracing::{debug, trace};

use crate::error::MosaicError;
use crate::face_detector::Region;

/// Default down-sampling ratio: one block per 10×10 pixels.
pub const DEFAULT_RATIO: f32 = 0.1;

/// Mosaic `region` of a copy of `image` and return the copy.
///
/// The region is shrunk by `ratio` with nearest-neighbour sampling and blown
/// back up to its original size the same way, which turns it into uniform
/// blocks roughly `1 / ratio` pixels wide. `image` itself is left untouched.
pub fn apply(
    image: &DynamicImage,
    region: Region,
    ratio: f32,
) -> Result<DynamicImage, MosaicError> {
    let mut output = image.clone();
    apply_in_place(&mut output, region, ratio)?;
    Ok(output)
}

/// Mosaic `region` of an image the caller owns.
///
/// A region reaching past the image edge is clamped first; a region with no
/// overlap leaves the image unchanged.
pub fn apply_in_place(
    image: &mut DynamicImage,
    region: Region,
    ratio: f32,
) -> Result<(), MosaicError> {
    validate_ratio(ratio)?;

    let Some(clamped) = region.clamp_to(image.width(), image.height()) else {
        debug!(?region, "region outside image, skipping");
        return Ok(());
    };
    if clamped != region {
        debug!(?region, ?clamped, "region clamped to image bounds");
    }

    let (small_w, small_h) = downsampled_size(clamped.width, clamped.height, ratio);
    trace!(?clamped, small_w, small_h, "mosaicking region");

    let blocks = image
        .crop_imm(clamped.x, clamped.y, clamped.width, clamped.height)
        .resize_exact(small_w, small_h, FilterType::Nearest)
        .resize_exact(clamped.width, clamped.height, FilterType::Nearest);
    imageops::replace(image, &blocks, i64::from(clamped.x), i64::from(clamped.y));
    Ok(())
}

/// Reject ratios outside `(0.0, 1.0]`.
pub fn validate_ratio(ratio: f32) -> Result<(), MosaicError> {
    if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(MosaicError::InvalidRatio(ratio))
    }
}

/// Size of the intermediate image, never collapsing an axis below one pixel.
fn downsampled_size(width: u32, height: u32, ratio: f32) -> (u32, u32) {
    let scale = |side: u32| {
        let scaled = (f64::from(side) * f64::from(ratio)).round() as u32;
        scaled.clamp(1, side.max(1))
    };
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage};

    /// Grid where every pixel has a distinct value.
    fn make_distinct_gray(width: u32, height: u32) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, y| Luma([(y * width + x) as u8]));
        DynamicImage::ImageLuma8(img)
    }

    fn make_noise_rgb(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(31) ^ y.wrapping_mul(17);
            Rgb([v as u8, (v >> 3) as u8, (x + y) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn pixels_in(image: &DynamicImage, region: Region) -> Vec<[u8; 4]> {
        let mut out = Vec::new();
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                out.push(image.get_pixel(x, y).0);
            }
        }
        out
    }

    #[test]
    fn four_by_four_top_left_block() {
        let input = make_distinct_gray(4, 4);
        let region = Region::new(0, 0, 2, 2);
        let output = apply(&input, region, 0.5).unwrap();

        assert_ne!(pixels_in(&output, region), pixels_in(&input, region));
        let block: HashSet<_> = pixels_in(&output, region).into_iter().collect();
        assert_eq!(block.len(), 1, "2x2 block should collapse to one value");

        for y in 0..4 {
            for x in 0..4 {
                if x < 2 && y < 2 {
                    continue;
                }
                assert_eq!(output.get_pixel(x, y), input.get_pixel(x, y), "({x}, {y})");
            }
        }
    }

    #[test]
    fn ratio_one_is_identity() {
        let input = make_noise_rgb(24, 18);
        let output = apply(&input, Region::new(3, 2, 15, 11), 1.0).unwrap();
        assert_eq!(output.as_bytes(), input.as_bytes());
    }

    #[test]
    fn input_is_not_mutated() {
        let input = make_noise_rgb(20, 20);
        let before = input.as_bytes().to_vec();
        let output = apply(&input, Region::new(0, 0, 20, 20), 0.1).unwrap();
        assert_eq!(input.as_bytes(), &before[..]);
        assert_ne!(output.as_bytes(), &before[..]);
    }

    #[test]
    fn default_ratio_produces_few_blocks() {
        let input = make_noise_rgb(40, 40);
        let region = Region::new(10, 10, 20, 20);
        let output = apply(&input, region, DEFAULT_RATIO).unwrap();
        // 20 × 0.1 = 2 samples per axis.
        let colors: HashSet<_> = pixels_in(&output, region).into_iter().collect();
        assert!(colors.len() <= 4, "got {} distinct colors", colors.len());
    }

    #[test]
    fn region_touching_far_edge() {
        let input = make_noise_rgb(10, 8);
        let region = Region::new(6, 4, 4, 4);
        let output = apply(&input, region, 0.25).unwrap();
        let colors: HashSet<_> = pixels_in(&output, region).into_iter().collect();
        assert_eq!(colors.len(), 1);
        assert_eq!(output.dimensions(), input.dimensions());
    }

    #[test]
    fn region_past_edge_is_clamped() {
        let input = make_noise_rgb(10, 10);
        let output = apply(&input, Region::new(7, 7, 50, 50), 0.1).unwrap();
        assert_eq!(output.dimensions(), (10, 10));
        let colors: HashSet<_> = pixels_in(&output, Region::new(7, 7, 3, 3))
            .into_iter()
            .collect();
        assert_eq!(colors.len(), 1);
        assert_eq!(output.get_pixel(0, 0), input.get_pixel(0, 0));
    }

    #[test]
    fn region_outside_is_noop() {
        let input = make_noise_rgb(10, 10);
        let output = apply(&input, Region::new(10, 3, 4, 4), 0.1).unwrap();
        assert_eq!(output.as_bytes(), input.as_bytes());
    }

    #[test]
    fn tiny_region_keeps_one_pixel_intermediate() {
        assert_eq!(downsampled_size(3, 2, 0.1), (1, 1));
        assert_eq!(downsampled_size(1, 1, 0.01), (1, 1));
        assert_eq!(downsampled_size(100, 40, 0.1), (10, 4));

        let input = make_noise_rgb(6, 6);
        let output = apply(&input, Region::new(1, 1, 3, 2), 0.1).unwrap();
        assert_eq!(output.dimensions(), (6, 6));
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        let input = make_noise_rgb(4, 4);
        for ratio in [0.0, -0.5, 1.5, f32::NAN, f32::INFINITY] {
            let result = apply(&input, Region::new(0, 0, 2, 2), ratio);
            assert!(
                matches!(result, Err(MosaicError::InvalidRatio(_))),
                "ratio {ratio} accepted"
            );
        }
    }
}
