use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::MosaicError;
use crate::face_detector::{FaceDetector, Region};

/// SeetaFace frontal model compiled into the crate.
pub static BUNDLED_MODEL: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../model/seeta_fd_frontal_v1.0.bin"
));

/// Tuning for the sliding-window scan.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Smallest face edge, in pixels, the scan looks for.
    pub min_face_size: u32,
    /// Minimum classifier score for a window to count as a face.
    pub score_threshold: f64,
    /// Scale step between pyramid levels (0.0–1.0).
    pub pyramid_scale_factor: f32,
    /// Horizontal and vertical window step, in pixels.
    pub slide_window_step: (u32, u32),
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: (4, 4),
        }
    }
}

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// The model is read once and never mutated afterwards: every call to
/// [`FaceDetector::detect`] builds a short-lived detector from a clone of it,
/// so one instance can be shared by all requests behind an `Arc`.
pub struct RustfaceDetector {
    model: rustface::Model,
    settings: DetectorSettings,
}

impl RustfaceDetector {
    /// Load the model from a file on disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MosaicError> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            MosaicError::ModelLoad(format!("{}: {e}", path.as_ref().display()))
        })?;
        let detector = Self::from_bytes(&data)?;
        info!(model_bytes = data.len(), "face detection model loaded");
        Ok(detector)
    }

    /// Load the model compiled into the crate ([`BUNDLED_MODEL`]).
    pub fn load_default() -> Result<Self, MosaicError> {
        let detector = Self::from_bytes(BUNDLED_MODEL)?;
        debug!(model_bytes = BUNDLED_MODEL.len(), "bundled face model loaded");
        Ok(detector)
    }

    /// Parse a model already held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MosaicError> {
        let model = rustface::read_model(std::io::Cursor::new(data))
            .map_err(|e| MosaicError::ModelLoad(e.to_string()))?;
        Ok(Self {
            model,
            settings: DetectorSettings::default(),
        })
    }

    /// Replace the scan settings.
    pub fn with_settings(mut self, settings: DetectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The active scan settings.
    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<Region> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.settings.min_face_size);
        detector.set_score_thresh(self.settings.score_threshold);
        detector.set_pyramid_scale_factor(self.settings.pyramid_scale_factor);
        let (step_x, step_y) = self.settings.slide_window_step;
        detector.set_slide_window_step(step_x, step_y);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));
        debug!(candidates = faces.len(), width, height, "rustface scan finished");

        faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                Region::from_signed(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    (width, height),
                )
            })
            .collect()
    }
}
