//! HTTP variant of the tool-call surface.
//!
//! `POST /rpc` accepts exactly the payload the stdio transport reads from a
//! line and returns exactly the object it would write; `GET /events` is a
//! server-sent-events channel announcing the server and then keeping the
//! connection warm; `GET /health` is a liveness probe.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::protocol;
use crate::state::CoreContext;

/// Build the router. Middleware mirrors the stdio behaviour: per-request
/// timeout, trace logging, permissive CORS for local tooling.
pub fn build_router(ctx: Arc<CoreContext>) -> Router {
    let timeout = Duration::from_secs(ctx.config.server.timeout_secs.max(1) + 1);
    Router::new()
        .route("/health", get(health))
        .route("/rpc", post(rpc))
        .route("/events", get(events))
        .layer(TimeoutLayer::new(timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health(State(ctx): State<Arc<CoreContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chunks": ctx.chunks.len(),
        "uptime_minutes": (ctx.stats.uptime_minutes() * 10.0).round() / 10.0,
    }))
}

/// Identical payload shape to one stdio line in, one line out.
async fn rpc(State(ctx): State<Arc<CoreContext>>, Json(request): Json<Value>) -> Json<Value> {
    Json(protocol::handle_request(&ctx, request).await)
}

/// Announce the server, then keep-alive. Clients POST requests to `/rpc`
/// and hold this stream open for liveness.
async fn events(
    State(_ctx): State<Arc<CoreContext>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let info = json!({
        "name": "anchora",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoint": "/rpc",
    });
    let stream = tokio_stream::once(Ok(Event::default()
        .event("server_info")
        .data(info.to_string())));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchora::EngineConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.embedding.dimension = 16;
        config.embedding.model = "hash-sin-16".to_string();
        let ctx = Arc::new(CoreContext::build(config).unwrap());
        (dir, build_router(ctx))
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (_guard, router) = router();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn rpc_round_trips_initialize() {
        let (_guard, router) = router();
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        let response = router
            .oneshot(
                Request::post("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["result"]["serverInfo"]["name"], "anchora");
    }

    #[tokio::test]
    async fn events_is_an_event_stream() {
        let (_guard, router) = router();
        let response = router
            .oneshot(Request::get("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/event-stream"));
    }
}
