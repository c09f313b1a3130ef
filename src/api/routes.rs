use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::AppState;
use super::health;
use super::response::{self, ApiError};
use super::validation::{CheckPortRangeRequest, CheckPortRequest, CheckPortsRequest, parse_body};
use crate::probe::prelude::*;

/// Largest request body the check endpoints will read.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    total: usize,
    reachable: usize,
    results: Vec<ProbeResult>,
}

impl BatchResponse {
    fn new(host: String, range: Option<String>, results: Vec<ProbeResult>) -> Self {
        BatchResponse {
            host,
            range,
            total: results.len(),
            reachable: results.iter().filter(|r| r.is_reachable).count(),
            results,
        }
    }
}

/// A JSON request body.
///
/// Unlike `axum::Json` an empty body reads as `T::default()`, and syntax
/// errors come back in the API's own error shape.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::BodyTooLarge
            } else {
                ApiError::BodyRead(rejection.body_text())
            }
        })?;

        Ok(JsonBody(parse_body(&body)?))
    }
}

/// Builds the API router with its middleware.
pub fn create_app(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/api/check-port", post(check_port))
        .route("/api/check-ports", post(check_ports))
        .route("/api/check-port-range", post(check_port_range))
        .fallback(response::not_found)
        .method_not_allowed_fallback(response::not_found)
        .with_state(state);

    with_middleware(router)
}

/// Request tracing, permissive CORS, panic-to-500 and the body size limit,
/// outermost first.
fn with_middleware(router: Router) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    router.layer(
        ServiceBuilder::new()
            .layer(trace_layer)
            .layer(CorsLayer::permissive())
            .layer(CatchPanicLayer::custom(response::panic_response))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(DefaultBodyLimit::disable()),
    )
}

async fn check_port(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CheckPortRequest>,
) -> Result<Json<ProbeResult>, ApiError> {
    let check = request.validate()?;

    let result = state.prober.probe(&check.host, check.port, check.timeout).await;
    state.export(std::slice::from_ref(&result));

    Ok(Json(result))
}

async fn check_ports(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CheckPortsRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let check = request.validate(state.max_ports)?;

    let results = state.prober.probe_many(&check.host, &check.ports, check.timeout).await;
    state.export(&results);

    Ok(Json(BatchResponse::new(check.host, None, results)))
}

async fn check_port_range(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CheckPortRangeRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let check = request.validate(state.max_port_range)?;

    let results = state
        .prober
        .probe_range(&check.host, check.start_port, check.end_port, check.timeout)
        .await;
    state.export(&results);

    let range = format!("{}-{}", check.start_port, check.end_port);
    Ok(Json(BatchResponse::new(check.host, Some(range), results)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, CONTENT_LENGTH,
        CONTENT_TYPE, ORIGIN,
    };
    use axum::http::{Method, Response};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Prober::new(Duration::from_secs(2)), 50, 100, None))
    }

    fn get_request(path: &str) -> Request {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(ORIGIN, "http://localhost:8080")
            .body(Body::empty())
            .expect("request")
    }

    fn post_request(path: &str, body: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn send(app: Router, req: Request) -> Response<Body> {
        app.oneshot(req).await.expect("router is infallible")
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        }
    }

    async fn call(req: Request) -> (StatusCode, serde_json::Value) {
        let response = send(create_app(state()), req).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    #[tokio::test]
    async fn test_index() {
        let (status, body) = call(get_request("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "portbox Port Check API");
        assert!(body["version"].is_string());
        assert!(body["endpoints"].is_object());
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (status, body) = call(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
        assert!(body["uptime"].is_number());
        assert!(body.get("memory").is_some());

        let (status, body) = call(get_request("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");

        let (status, body) = call(get_request("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");
    }

    #[tokio::test]
    async fn test_responses_allow_any_origin() {
        let response = send(create_app(state()), get_request("/health/live")).await;

        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (status, body) = call(get_request("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");

        // right path, wrong method
        let (status, body) = call(get_request("/api/check-port")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_preflight() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/check-port")
            .header(ORIGIN, "http://localhost:8080")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .expect("request");

        let response = send(create_app(state()), req).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn test_check_port_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let body = format!(r#"{{"host": "127.0.0.1", "port": {port}, "timeout": 1000}}"#);
        let (status, body) = call(post_request("/api/check-port", &body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["host"], "127.0.0.1");
        assert_eq!(body["port"], port);
        assert_eq!(body["isReachable"], true);
        assert!(body["responseTime"].is_number());
        assert!(body["timestamp"].is_string());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_check_port_validation() {
        let (status, body) = call(post_request("/api/check-port", r#"{"port": 80}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Host and port are required");
        assert!(body["example"].is_object());

        let (status, body) = call(post_request("/api/check-port", r#"{"host": "google.com", "port": 70000}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Port must be a number between 1 and 65535");

        let (status, body) = call(post_request("/api/check-port", r#"{"host": "google.com", "port": "80"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Port must be a number between 1 and 65535");

        let (status, body) = call(post_request("/api/check-port", "{oops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON body");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_empty_body_is_missing_fields() {
        let (status, body) = call(post_request("/api/check-port-range", "")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Host, startPort, and endPort are required");
    }

    #[tokio::test]
    async fn test_check_ports() {
        let open = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let open_port = open.local_addr().expect("addr").port();
        let closed_port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };

        let body = format!(r#"{{"host": "127.0.0.1", "ports": [{open_port}, {closed_port}], "timeout": 1000}}"#);
        let (status, body) = call(post_request("/api/check-ports", &body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["host"], "127.0.0.1");
        assert_eq!(body["total"], 2);
        assert_eq!(body["reachable"], 1);
        assert!(body.get("range").is_none());
        let results = body["results"].as_array().expect("results");
        assert_eq!(results[0]["port"], open_port);
        assert_eq!(results[1]["port"], closed_port);
        assert_eq!(results[1]["isReachable"], false);
        assert!(results[1]["error"].is_string());
    }

    #[tokio::test]
    async fn test_check_ports_too_many() {
        let ports: Vec<String> = (1..=51).map(|p| p.to_string()).collect();
        let body = format!(r#"{{"host": "google.com", "ports": [{}]}}"#, ports.join(","));

        let (status, body) = call(post_request("/api/check-ports", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Maximum 50 ports allowed per request");
    }

    #[tokio::test]
    async fn test_check_ports_empty() {
        let (status, body) = call(post_request("/api/check-ports", r#"{"host": "127.0.0.1", "ports": []}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["reachable"], 0);
        assert_eq!(body["results"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_check_port_range() {
        let body = r#"{"host": "127.0.0.1", "startPort": 80, "endPort": 82, "timeout": 500}"#;
        let (status, body) = call(post_request("/api/check-port-range", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["host"], "127.0.0.1");
        assert_eq!(body["range"], "80-82");
        assert_eq!(body["total"], 3);
        let ports: Vec<u64> = body["results"]
            .as_array()
            .expect("results")
            .iter()
            .map(|r| r["port"].as_u64().expect("port"))
            .collect();
        assert_eq!(ports, vec![80, 81, 82]);
    }

    #[tokio::test]
    async fn test_check_port_range_too_large() {
        let body = r#"{"host": "google.com", "startPort": 1, "endPort": 200}"#;
        let (status, body) = call(post_request("/api/check-port-range", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Port range cannot exceed 100 ports");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let oversized = format!(r#"{{"host": "{}", "port": 80}}"#, "a".repeat(MAX_BODY_BYTES));

        // streamed without a length: the limit trips while the body is read
        let (status, body) = call(post_request("/api/check-port", &oversized)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Request body too large");

        // declared length: rejected before the handler runs
        let mut req = post_request("/api/check-port", &oversized);
        req.headers_mut().insert(CONTENT_LENGTH, oversized.len().into());
        let response = send(create_app(state()), req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panicking_handler_is_internal_error() {
        let app = with_middleware(Router::new().route("/explode", get(explode)));

        let response = send(app, get_request("/explode")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["message"], "handler exploded");
    }
}
