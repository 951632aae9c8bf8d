use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, instrument};

use crate::codec::{decode_image, detect_format, encode_png, DecodeLimits};
use crate::error::MosaicError;
use crate::face_detector::{FaceDetector, Region};
use crate::mosaic::{apply_in_place, validate_ratio};
use crate::{MosaicedImage, NoFacePolicy};

/// Locate faces on a grayscale view of `image`.
pub(crate) fn locate_faces(image: &DynamicImage, detector: &dyn FaceDetector) -> Vec<Region> {
    let gray = image::imageops::grayscale(image);
    let (width, height) = (gray.width(), gray.height());

    detector
        .detect(gray.as_raw(), width, height)
        .into_iter()
        .filter_map(|region| region.clamp_to(width, height))
        .collect()
}

/// Mosaic every region in order, each on top of the previous result.
pub(crate) fn mosaic_all(
    image: DynamicImage,
    regions: &[Region],
    ratio: f32,
) -> Result<DynamicImage, MosaicError> {
    regions.iter().try_fold(image, |mut acc, region| {
        apply_in_place(&mut acc, *region, ratio)?;
        Ok(acc)
    })
}

/// Full pipeline: decode → grayscale → detect → mosaic each face → encode.
#[instrument(skip(input, detector), fields(input_len = input.len()))]
pub(crate) fn mosaic_pipeline(
    input: &[u8],
    detector: &dyn FaceDetector,
    ratio: f32,
    limits: &DecodeLimits,
    no_face_policy: NoFacePolicy,
) -> Result<MosaicedImage, MosaicError> {
    validate_ratio(ratio)?;

    let decoded = decode_image(input, limits)?;
    let (width, height) = (decoded.width(), decoded.height());

    let faces = locate_faces(&decoded, detector);
    debug!(faces = faces.len(), "face detection finished");

    if faces.is_empty() {
        return match no_face_policy {
            NoFacePolicy::Passthrough => {
                info!("no face detected, returning input unchanged");
                Ok(MosaicedImage {
                    data: input.to_vec(),
                    format: detect_format(input)?,
                    width,
                    height,
                    original_size: input.len(),
                    faces,
                })
            }
            NoFacePolicy::Reject => Err(MosaicError::NoFaceDetected),
        };
    }

    let mosaicked = mosaic_all(decoded, &faces, ratio)?;
    let data = encode_png(&mosaicked)?;
    info!(faces = faces.len(), output_len = data.len(), "faces mosaicked");

    Ok(MosaicedImage {
        data,
        format: ImageFormat::Png,
        width,
        height,
        original_size: input.len(),
        faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    struct FixedDetector(Vec<Region>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _gray: &[u8], _width: u32, _height: u32) -> Vec<Region> {
            self.0.clone()
        }
    }

    fn make_test_rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7) as u8, (y * 11) as u8, (x ^ y) as u8])
        }))
    }

    #[test]
    fn mosaic_all_is_cumulative() {
        let input = make_test_rgb(40, 20);
        let first = Region::new(0, 0, 10, 10);
        let second = Region::new(20, 5, 10, 10);
        let output = mosaic_all(input.clone(), &[first, second], 0.1).unwrap();

        for region in [first, second] {
            let (x, y) = (region.x, region.y);
            let top_left = output.get_pixel(x, y);
            for dy in 0..region.height {
                for dx in 0..region.width {
                    assert_eq!(output.get_pixel(x + dx, y + dy), top_left);
                }
            }
        }
        assert_eq!(output.get_pixel(35, 18), input.get_pixel(35, 18));
    }

    #[test]
    fn mosaic_all_with_no_regions_is_identity() {
        let input = make_test_rgb(8, 8);
        let output = mosaic_all(input.clone(), &[], 0.1).unwrap();
        assert_eq!(output.as_bytes(), input.as_bytes());
    }

    #[test]
    fn locate_faces_drops_out_of_bounds_regions() {
        let image = make_test_rgb(20, 20);
        let detector = FixedDetector(vec![
            Region::new(15, 15, 10, 10),
            Region::new(30, 0, 5, 5),
            Region::new(2, 2, 4, 4),
        ]);
        let faces = locate_faces(&image, &detector);
        assert_eq!(
            faces,
            vec![Region::new(15, 15, 5, 5), Region::new(2, 2, 4, 4)]
        );
    }

    #[test]
    fn pipeline_rejects_bad_ratio_before_decoding() {
        let detector = FixedDetector(vec![]);
        let result = mosaic_pipeline(
            b"whatever",
            &detector,
            2.0,
            &DecodeLimits::default(),
            NoFacePolicy::Passthrough,
        );
        assert!(matches!(result, Err(MosaicError::InvalidRatio(_))));
    }
}
