//! Correlation identifier propagation.

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Response header carrying the correlation identifier.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Underscore variant echoed alongside [`CORRELATION_ID_HEADER`].
pub const CORRELATION_ID_ALT_HEADER: &str = "correlation_id";

const INBOUND_HEADERS: [&str; 2] = ["correlation-id", CORRELATION_ID_ALT_HEADER];

/// Correlation identifier attached to each request's extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

fn correlation_id_from_headers(headers: &HeaderMap) -> Option<String> {
    INBOUND_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    })
}

fn add_correlation_headers(response: &mut Response, correlation_id: &str) {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static(CORRELATION_ID_ALT_HEADER),
            value.clone(),
        );
        headers.insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }
}

/// Middleware that reuses the caller's correlation identifier, or mints a
/// UUIDv4, and echoes it on the response.
pub async fn correlation_middleware(mut req: Request<Body>, next: Next) -> Response {
    let correlation_id = correlation_id_from_headers(req.headers())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let mut response = next.run(req).instrument(span).await;
    add_correlation_headers(&mut response, &correlation_id);
    response
}
