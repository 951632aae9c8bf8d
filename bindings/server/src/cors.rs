use std::time::Duration;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::warn;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

/// CORS for browser clients: listed origins, credentials allowed, any method
/// and any requested header. `"*"` in `origins` echoes every origin back.
pub fn layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<&str> = origins
        .iter()
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .collect();

    let allow_origin = if origins.contains(&"*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins.into_iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(origin, "ignoring unusable CORS origin"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::DELETE,
            Method::GET,
            Method::HEAD,
            Method::OPTIONS,
            Method::PATCH,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(PREFLIGHT_MAX_AGE)
}
