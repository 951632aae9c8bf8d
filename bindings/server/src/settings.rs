use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use facemosaic::{DecodeLimits, MosaicError, NoFacePolicy, RustfaceDetector, DEFAULT_RATIO};

/// Service title reported at startup.
pub const TITLE: &str = "facemosaic";
/// Service description, taken from the crate metadata.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
/// Service version, taken from the crate metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Runtime configuration of the HTTP service.
#[derive(Parser, Debug, Clone)]
#[command(name = TITLE, version, about, long_about = None)]
pub struct Settings {
    /// Address to listen on
    #[arg(long, env = "FACEMOSAIC_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "FACEMOSAIC_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Prefix shared by every API route
    #[arg(long, default_value = "/api/v1")]
    pub api_prefix: String,

    /// Origins allowed to call the API from a browser (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "http://localhost")]
    pub origins: Vec<String>,

    /// SeetaFace detection model to use instead of the bundled one
    #[arg(short, long, value_name = "FILE", env = "FACEMOSAIC_MODEL")]
    pub model: Option<PathBuf>,

    /// Down-sampling ratio of the mosaic, in (0, 1]
    #[arg(long, default_value_t = DEFAULT_RATIO)]
    pub ratio: f32,

    /// Largest accepted image width or height, in pixels
    #[arg(long, default_value_t = 8192)]
    pub max_dimension: u32,

    /// Largest accepted request body, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Answer 422 instead of echoing the upload when no face is found
    #[arg(long)]
    pub reject_no_face: bool,
}

impl Settings {
    /// Load the face detector: `--model` if given, the bundled model otherwise.
    pub fn load_detector(&self) -> Result<RustfaceDetector, MosaicError> {
        match &self.model {
            Some(path) => RustfaceDetector::load(path),
            None => RustfaceDetector::load_default(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn no_face_policy(&self) -> NoFacePolicy {
        if self.reject_no_face {
            NoFacePolicy::Reject
        } else {
            NoFacePolicy::Passthrough
        }
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits::square(self.max_dimension)
    }

    /// `api_prefix` without a trailing slash; `""` mounts routes at the root.
    pub fn normalized_prefix(&self) -> String {
        let prefix = self.api_prefix.trim().trim_end_matches('/');
        if prefix.is_empty() || prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        }
    }
}
