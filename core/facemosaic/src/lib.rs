//! Face mosaicking: decode an image, find the faces in it, and cover each one
//! with a coarse block mosaic before re-encoding it as PNG.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facemosaic::{MosaicPipeline, RustfaceDetector};
//!
//! let detector = RustfaceDetector::load_default().unwrap();
//! let pipeline = MosaicPipeline::new(Arc::new(detector)).ratio(0.1);
//!
//! let raw_bytes = std::fs::read("group.jpg").unwrap();
//! let result = pipeline.process_image(&raw_bytes).unwrap();
//! println!("{} face(s), {} bytes", result.faces.len(), result.data.len());
//! ```
#![warn(missing_docs)]

/// Image decoding and PNG encoding.
pub mod codec;
mod error;
/// Face detection traits and data types.
pub mod face_detector;
/// The block-mosaic filter.
pub mod mosaic;
mod pipeline;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector backend.
pub mod rustface_backend;

use std::sync::Arc;

use image::ImageFormat;

/// Decode limits applied to untrusted input.
pub use codec::DecodeLimits;
/// Error type returned by facemosaic operations.
pub use error::MosaicError;
/// Face detection trait and face rectangle type.
pub use face_detector::{FaceDetector, Region};
/// Default mosaic down-sampling ratio.
pub use mosaic::DEFAULT_RATIO;
#[cfg(feature = "rustface")]
/// Built-in detector that loads the SeetaFace model.
pub use rustface_backend::{DetectorSettings, RustfaceDetector, BUNDLED_MODEL};

/// What to return when an image contains no detectable face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoFacePolicy {
    /// Return the input bytes unchanged, with an empty `faces` list.
    #[default]
    Passthrough,

    /// Fail with [`MosaicError::NoFaceDetected`].
    Reject,
}

/// Result of a single mosaic operation.
#[derive(Debug, Clone)]
pub struct MosaicedImage {
    /// The output image bytes.
    pub data: Vec<u8>,

    /// Format of `data`: PNG when faces were mosaicked, otherwise the input format.
    pub format: ImageFormat,

    /// Width of the image in pixels.
    pub width: u32,

    /// Height of the image in pixels.
    pub height: u32,

    /// Size of the original input in bytes.
    pub original_size: usize,

    /// Regions that were mosaicked, in the order they were applied.
    pub faces: Vec<Region>,
}

impl MosaicedImage {
    /// Whether the input was returned untouched because no face was found.
    pub fn is_passthrough(&self) -> bool {
        self.faces.is_empty()
    }

    /// Usual file extension for `data`, e.g. `"png"` or `"jpg"`.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Configured face-mosaic pipeline.
///
/// Build one at startup and share it: the detector sits behind an `Arc` and
/// every call to [`MosaicPipeline::process_image`] works on its own image.
#[derive(Clone)]
pub struct MosaicPipeline {
    detector: Arc<dyn FaceDetector>,
    ratio: f32,
    limits: DecodeLimits,
    no_face_policy: NoFacePolicy,
}

impl MosaicPipeline {
    /// Create a pipeline around a loaded face detector.
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            detector,
            ratio: DEFAULT_RATIO,
            limits: DecodeLimits::default(),
            no_face_policy: NoFacePolicy::default(),
        }
    }

    /// Set the mosaic down-sampling ratio in `(0.0, 1.0]` (default: 0.1).
    ///
    /// Smaller values give larger blocks. `1.0` leaves faces unchanged.
    pub fn ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    /// Set the decode limits (default: 8192×8192, 512 MiB).
    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the no-face policy (default: `NoFacePolicy::Passthrough`).
    pub fn no_face_policy(mut self, policy: NoFacePolicy) -> Self {
        self.no_face_policy = policy;
        self
    }

    /// Mosaic every face found in `input` and return the encoded result.
    ///
    /// Faces are mosaicked cumulatively in detector order, so all of them are
    /// covered in the output. Decode and encode failures are returned as is;
    /// nothing partial is ever produced.
    pub fn process_image(&self, input: &[u8]) -> Result<MosaicedImage, MosaicError> {
        pipeline::mosaic_pipeline(
            input,
            self.detector.as_ref(),
            self.ratio,
            &self.limits,
            self.no_face_policy,
        )
    }
}

impl std::fmt::Debug for MosaicPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MosaicPipeline")
            .field("ratio", &self.ratio)
            .field("limits", &self.limits)
            .field("no_face_policy", &self.no_face_policy)
            .finish_non_exhaustive()
    }
}
