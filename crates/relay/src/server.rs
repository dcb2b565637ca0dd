//! HTTP host adapter
//!
//! Routes:
//! - `POST <proxy_path>` - relay one telemetry batch
//! - `GET /health` - liveness
//!
//! Everything else answers 404.

use std::future::Future;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use contracts::{HeaderClass, HeaderSet};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::engine::TelemetryRelay;
use crate::transport::RelayResponse;

/// Build the router for `relay`
pub fn router(relay: TelemetryRelay, proxy_path: &str, max_body_bytes: u64) -> Router {
    let limit = usize::try_from(max_body_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route(proxy_path, post(relay_batch))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Serve `app` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Relay listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn relay_batch(
    State(relay): State<TelemetryRelay>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = to_header_set(&headers);

    match relay.process(Some(&body[..]), Some(&headers)).await {
        Ok(response) => into_response(response),
        Err(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            error!(error = %e, "Relay failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

/// Non-UTF-8 values are carried lossily
pub fn to_header_set(map: &HeaderMap) -> HeaderSet {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Destination response as an HTTP response
///
/// Framing headers are dropped; the server computes its own.
fn into_response(relayed: RelayResponse) -> Response {
    let mut response = Response::new(Body::from(relayed.body));
    *response.status_mut() =
        StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for entry in relayed.headers.iter() {
        if is_framing(&entry.name) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(entry.name.as_bytes()) else {
            continue;
        };
        for value in &entry.values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    response
}

fn is_framing(name: &str) -> bool {
    HeaderClass::classify(name) == HeaderClass::HostSpecific
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("transfer-encoding")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RelayOptions;
    use axum::http::Request;
    use dispatcher::Dispatcher;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn app(status: u16) -> (Router, MockServer) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/track"))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("x-ms-request-id", "42")
                    .set_body_string("{\"itemsAccepted\":1}"),
            )
            .mount(&server)
            .await;

        let options = RelayOptions {
            destination: format!("{}/v2/track", server.uri()),
            destination_timeout: Duration::from_secs(5),
            max_body_bytes: 1024,
            await_completion: true,
        };
        let relay = TelemetryRelay::new(options, Dispatcher::default()).unwrap();
        (router(relay, "/v2/track", 1024), server)
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_relays_destination_response() {
        let (app, _server) = app(200).await;
        let request = Request::post("/v2/track")
            .header("content-length", "2")
            .header("content-type", "application/x-json-stream")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-ms-request-id").unwrap(), "42");
        assert_eq!(body_of(response).await, b"{\"itemsAccepted\":1}");
    }

    #[tokio::test]
    async fn test_destination_failure_status_passed_through() {
        let (app, _server) = app(500).await;
        let request = Request::post("/v2/track")
            .header("content-length", "2")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_content_length_is_bad_request() {
        let (app, server) = app(200).await;
        let request = Request::post("/v2/track").body(Body::from("{}")).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_destination_is_bad_gateway() {
        let options = RelayOptions {
            destination: "http://127.0.0.1:1/v2/track".into(),
            destination_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let relay = TelemetryRelay::new(options, Dispatcher::default()).unwrap();
        let app = router(relay, "/v2/track", 1024);
        let request = Request::post("/v2/track")
            .header("content-length", "2")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let (app, _server) = app(200).await;

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, b"ok");

        let response = app
            .oneshot(Request::post("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_header_set_conversion() {
        let mut map = HeaderMap::new();
        map.append("x-tag", HeaderValue::from_static("a"));
        map.append("x-tag", HeaderValue::from_static("b"));
        map.insert("host", HeaderValue::from_static("relay.local"));

        let headers = to_header_set(&map);
        assert_eq!(headers.get_all("X-Tag"), ["a", "b"]);
        assert_eq!(headers.first("host"), Some("relay.local"));
    }
}
