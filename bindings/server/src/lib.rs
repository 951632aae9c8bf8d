//! HTTP service around the facemosaic pipeline.
//!
//! `POST {prefix}/sample/mosaic` takes an image (multipart `file` field or a
//! raw body) and answers with the faces mosaicked; `GET {prefix}/sample/plus`
//! is a small arithmetic endpoint kept for smoke tests.

pub mod cors;
pub mod error;
pub mod routes;
pub mod server;
pub mod settings;

pub use error::{Result, ServerError};
pub use routes::{router, AppState};
pub use server::Server;
pub use settings::Settings;
