use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facemosaic::MosaicError;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error(transparent)]
    Body(#[from] BytesRejection),

    #[error(transparent)]
    MultipartRejected(#[from] MultipartRejection),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("upload has no `{0}` field")]
    MissingField(&'static str),

    #[error(transparent)]
    Pipeline(#[from] MosaicError),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Query(_) | ServerError::MissingField(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Body(e) => e.status(),
            ServerError::MultipartRejected(e) => e.status(),
            ServerError::Multipart(e) => e.status(),
            ServerError::Pipeline(e) => pipeline_status(e),
            ServerError::Io(_) | ServerError::Bind { .. } | ServerError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing `detail`; internal details stay in the logs.
    ///
    /// Request validation failures use a list of `{type, loc, msg, input}`
    /// entries, everything else a plain message.
    pub fn detail(&self) -> Value {
        match self {
            ServerError::Query(e) => json!([{
                "type": "query_parsing",
                "loc": ["query"],
                "msg": e.body_text(),
                "input": Value::Null,
            }]),
            ServerError::MissingField(name) => json!([{
                "type": "missing",
                "loc": ["body", name],
                "msg": "Field required",
                "input": Value::Null,
            }]),
            ServerError::Body(e) => json!(e.body_text()),
            ServerError::MultipartRejected(e) => json!(e.body_text()),
            ServerError::Multipart(e) => json!(e.body_text()),
            ServerError::Pipeline(e) => json!(pipeline_detail(e)),
            ServerError::Io(_) | ServerError::Bind { .. } | ServerError::Join(_) => {
                json!("internal error")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

fn pipeline_status(error: &MosaicError) -> StatusCode {
    match error {
        MosaicError::Decode(_) | MosaicError::UnsupportedFormat => StatusCode::BAD_REQUEST,
        MosaicError::DimensionsExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
        MosaicError::NoFaceDetected => StatusCode::UNPROCESSABLE_ENTITY,
        MosaicError::Encode(_) | MosaicError::InvalidRatio(_) | MosaicError::ModelLoad(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn pipeline_detail(error: &MosaicError) -> &'static str {
    match error {
        MosaicError::Decode(_) | MosaicError::UnsupportedFormat => "unreadable image",
        MosaicError::DimensionsExceeded(_) => "image too large",
        MosaicError::NoFaceDetected => "no face detected",
        MosaicError::Encode(_) | MosaicError::InvalidRatio(_) | MosaicError::ModelLoad(_) => {
            "internal error"
        }
    }
}

/// Alias used throughout the server.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_client_statuses() {
        let unreadable = ServerError::from(MosaicError::Decode("bad".into()));
        assert_eq!(unreadable.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unreadable.detail(), "unreadable image");

        let too_big = ServerError::from(MosaicError::DimensionsExceeded("10000x1".into()));
        assert_eq!(too_big.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let no_face = ServerError::from(MosaicError::NoFaceDetected);
        assert_eq!(no_face.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(no_face.detail(), "no face detected");
    }

    #[test]
    fn internal_errors_hide_details() {
        let encode = ServerError::from(MosaicError::Encode("zero-sized".into()));
        assert_eq!(encode.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(encode.detail(), "internal error");

        let io = ServerError::from(std::io::Error::other("disk on fire"));
        assert_eq!(io.detail(), "internal error");
    }

    #[test]
    fn missing_field_is_a_validation_list() {
        let error = ServerError::MissingField("file");
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.detail()[0]["loc"], json!(["body", "file"]));
        assert_eq!(error.detail()[0]["type"], "missing");
    }

    #[test]
    fn response_carries_status_and_detail() {
        let response = ServerError::from(MosaicError::NoFaceDetected).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
