use thiserror::Error;

/// Error type returned by facemosaic operations.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("image exceeds decode limits: {0}")]
    DimensionsExceeded(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("mosaic ratio must be in (0.0, 1.0], got {0}")]
    InvalidRatio(f32),

    #[error("failed to load face detection model: {0}")]
    ModelLoad(String),

    #[error("no face detected")]
    NoFaceDetected,
}
