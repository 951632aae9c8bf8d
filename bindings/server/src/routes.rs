use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facemosaic::{FaceDetector, MosaicPipeline};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cors;
use crate::error::{Result, ServerError};
use crate::settings::Settings;

/// Form field that carries the uploaded image.
pub const FILE_FIELD: &str = "file";
/// Response header carrying the number of mosaicked faces.
pub const FACES_HEADER: &str = "x-faces-detected";

/// State shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: MosaicPipeline,
}

impl AppState {
    pub fn new(settings: &Settings, detector: Arc<dyn FaceDetector>) -> Self {
        let pipeline = MosaicPipeline::new(detector)
            .ratio(settings.ratio)
            .limits(settings.decode_limits())
            .no_face_policy(settings.no_face_policy());
        Self { pipeline }
    }
}

/// Full application: `/sample` routes under the API prefix, CORS and
/// request tracing.
pub fn router(settings: &Settings, state: AppState) -> Router {
    let sample: Router<Arc<AppState>> = Router::new()
        .route("/plus", get(plus))
        .route("/mosaic", post(mosaic))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(settings.max_body_bytes));
    let api = Router::new().nest("/sample", sample);

    let prefix = settings.normalized_prefix();
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    app.fallback(not_found)
        .layer(cors::layer(&settings.origins))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" }))).into_response()
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "detail": "Method Not Allowed" })),
    )
        .into_response()
}

/// Integer when both operands are integers and the sum fits, float otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(int) = raw.parse::<i64>() {
            return Some(Number::Int(int));
        }
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Number::Float)
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 + b as f64)),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }
}

// Query strings carry every value as text, so parse numbers from strings too.
impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct NumberVisitor;

        impl Visitor<'_> for NumberVisitor {
            type Value = Number;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer or a finite number")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Number, E> {
                Ok(Number::Int(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Number, E> {
                Ok(i64::try_from(value)
                    .map(Number::Int)
                    .unwrap_or(Number::Float(value as f64)))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Number, E> {
                if value.is_finite() {
                    Ok(Number::Float(value))
                } else {
                    Err(E::invalid_value(Unexpected::Float(value), &self))
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Number, E> {
                Number::parse(value)
                    .ok_or_else(|| E::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(NumberVisitor)
    }
}

/// Query of `GET /sample/plus`.
#[derive(Debug, Deserialize)]
pub struct AddIn {
    pub a: Number,
    pub b: Number,
}

/// Body of a `GET /sample/plus` answer.
#[derive(Debug, Serialize)]
pub struct AddOut {
    pub result: Number,
}

async fn plus(query: std::result::Result<Query<AddIn>, QueryRejection>) -> Result<Json<AddOut>> {
    let Query(AddIn { a, b }) = query?;
    Ok(Json(AddOut { result: a.add(b) }))
}

async fn mosaic(State(state): State<Arc<AppState>>, request: Request) -> Result<Response> {
    let upload = upload(request, &state)
        .await?
        .ok_or(ServerError::MissingField(FILE_FIELD))?;

    let pipeline = state.pipeline.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.process_image(&upload)).await??;

    info!(
        faces = result.faces.len(),
        width = result.width,
        height = result.height,
        input_bytes = result.original_size,
        output_bytes = result.data.len(),
        "mosaic done"
    );
    Ok((
        [
            (CONTENT_TYPE.as_str(), result.format.to_mime_type().to_string()),
            (FACES_HEADER, result.faces.len().to_string()),
        ],
        result.data,
    )
        .into_response())
}

/// Image bytes from a `file` form field, or the raw body for any other content type.
async fn upload(request: Request, state: &Arc<AppState>) -> Result<Option<Bytes>> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        });

    let data = if is_multipart {
        let mut multipart = Multipart::from_request(request, state).await?;
        let mut found = None;
        while let Some(field) = multipart.next_field().await? {
            if field.name() == Some(FILE_FIELD) {
                found = Some(field.bytes().await?);
                break;
            }
        }
        found
    } else {
        Some(Bytes::from_request(request, state).await?)
    };
    Ok(data.filter(|data| !data.is_empty()))
}
