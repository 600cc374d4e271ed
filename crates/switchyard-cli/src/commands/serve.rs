//! Serve command - HTTP gateway in front of the router
//!
//! Endpoints:
//! - `GET /health`
//! - `GET /v1/status` - router status as JSON
//! - `GET /metrics` - Prometheus text
//! - `POST /v1/route` - task JSON in, result envelope out

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router as HttpRouter,
};
use clap::Args;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use switchyard_llm::{RouteResult, Router, RouterStatus, Task, TaskSpec};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", env = "SWITCHYARD_ADDR")]
    addr: SocketAddr,
}

/// Run the serve command
pub async fn run(config: Option<&Path>, args: ServeArgs) -> Result<()> {
    let router = Arc::new(super::load_router(config)?);
    let app = app(router);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    crate::print_success(&format!("Switchyard gateway listening on http://{}", args.addr));
    tracing::info!(addr = %args.addr, "Gateway started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server failed")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// Build the HTTP application around a shared router
pub fn app(router: Arc<Router>) -> HttpRouter {
    HttpRouter::new()
        .route("/health", get(health_check))
        .route("/v1/status", get(router_status))
        .route("/metrics", get(prometheus_metrics))
        .route("/v1/route", post(route_task))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn router_status(State(router): State<Arc<Router>>) -> Json<RouterStatus> {
    Json(router.status().await)
}

async fn prometheus_metrics(State(router): State<Arc<Router>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        router.metrics().snapshot().to_prometheus(),
    )
}

async fn route_task(
    State(router): State<Arc<Router>>,
    payload: Result<Json<TaskSpec>, JsonRejection>,
) -> Result<Json<RouteResult>, (StatusCode, Json<Value>)> {
    let Json(spec) = payload.map_err(|e| invalid_task(e.body_text()))?;
    let task = Task::try_from(spec).map_err(|e| invalid_task(e.to_string()))?;

    Ok(Json(router.route(&task).await))
}

fn invalid_task(message: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use switchyard_llm::{BackendKind, MockBackend};
    use tower::ServiceExt;

    fn test_app() -> HttpRouter {
        let router = Router::builder()
            .backend(Arc::new(MockBackend::new("local", BackendKind::LocalChat)))
            .fallback_order(["local"])
            .build();
        app(Arc::new(router))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_route_endpoint() {
        let request = Request::post("/v1/route")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"kind": "quality", "content": "fn main() {}"}"#))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["backend_id"], "local");
    }

    #[tokio::test]
    async fn test_route_rejects_invalid_task() {
        let request = Request::post("/v1/route")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"content": "x", "temperature": 7.5}"#))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("temperature"));
    }

    #[tokio::test]
    async fn test_route_rejects_malformed_json() {
        let request = Request::post("/v1/route")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_app();
        let route = Request::post("/v1/route")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"content": "fn main() {}"}"#))
            .unwrap();
        app.clone().oneshot(route).await.unwrap();

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("switchyard_routes_total 1"));
    }
}
