//! Tower-level layers wrapped around the whole router.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request metadata extracted before routing.
///
/// Inserted as a request extension by [`request_context_middleware_fn`] and
/// copied into the [`Context`](crate::Context) of the dispatched action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Correlation ID from `X-Correlation-ID` or generated
    pub correlation_id: Uuid,

    /// `Accept-Language` value (default: "en")
    pub language: String,

    /// Unique request ID (always generated)
    pub request_id: Uuid,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            language: "en".to_string(),
            request_id: Uuid::new_v4(),
        }
    }
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            correlation_id: extract_correlation_id(headers),
            language: extract_language(headers),
            request_id: Uuid::new_v4(),
        }
    }
}

/// `X-Correlation-ID` if it holds a valid UUID, otherwise a new one.
fn extract_correlation_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn extract_language(headers: &HeaderMap) -> String {
    headers
        .get("accept-language")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("en")
        .to_string()
}

/// Attach a [`RequestContext`] to the request and echo its correlation ID
/// in the response.
///
/// ```ignore
/// EywaApp::new(config)
///     .request_context()
///     .register_web_controller::<PostController>()?
///     .serve()
///     .await
/// ```
pub async fn request_context_middleware_fn(mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(req.headers());
    let correlation_id = ctx.correlation_id;
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    response
}

/// Structured access log built on tower-http's `TraceLayer`.
///
/// ```text
/// request{method=GET uri=/posts version=HTTP/1.1}: finished processing request latency=3 ms status=200
/// ```
pub fn request_logging_middleware() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    tower_http::trace::DefaultMakeSpan,
> {
    tower_http::trace::TraceLayer::new_for_http().on_response(
        tower_http::trace::DefaultOnResponse::new()
            .level(tracing::Level::INFO)
            .latency_unit(tower_http::LatencyUnit::Millis),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    #[test]
    fn test_extract_correlation_id_from_header() {
        let mut headers = HeaderMap::new();
        let uuid = Uuid::new_v4();
        headers.insert(
            "x-correlation-id",
            HeaderValue::from_str(&uuid.to_string()).unwrap(),
        );
        assert_eq!(extract_correlation_id(&headers), uuid);
    }

    #[test]
    fn test_invalid_correlation_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", HeaderValue::from_static("nope"));
        let result = extract_correlation_id(&headers);
        assert_eq!(result.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn test_from_headers_language() {
        let mut headers = HeaderMap::new();
        headers.insert("accept-language", HeaderValue::from_static("it-IT"));
        assert_eq!(RequestContext::from_headers(&headers).language, "it-IT");
        assert_eq!(RequestContext::from_headers(&HeaderMap::new()).language, "en");
    }

    #[tokio::test]
    async fn test_correlation_id_is_echoed() {
        let app = Router::new()
            .route(
                "/",
                get(|axum::Extension(ctx): axum::Extension<RequestContext>| async move {
                    ctx.language
                }),
            )
            .layer(axum::middleware::from_fn(request_context_middleware_fn));

        let id = Uuid::new_v4();
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header("x-correlation-id", id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-correlation-id"], id.to_string().as_str());
    }
}
