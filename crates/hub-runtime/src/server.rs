//! HTTP surface of the hub.
//!
//! One port serves everything:
//! - `GET /health`, `GET /favicon.ico`, `GET /metrics`
//! - `/api/v1/*` target management
//! - any other path: a WebSocket upgrade becomes a validator connection,
//!   a plain request gets `426 Upgrade Required`

use crate::api;
use crate::config::ApiConfig;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hub_coordinator::{HubCoordinator, TargetCatalog, WebSocketConfig, WebSocketHandler};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Body returned to plain HTTP requests on the socket path
pub const UPGRADE_REQUIRED_BODY: &str = "Please connect via WebSocket.\n";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<HubCoordinator>,
    pub catalog: Arc<dyn TargetCatalog>,
    pub websocket: WebSocketConfig,
    pub api: ApiConfig,
}

/// Build the hub router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api::routes())
        .fallback(validator_socket)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "healthy server"
    }))
}

async fn metrics() -> Response {
    match watchtower_telemetry::metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Accept validator sockets; refuse plain HTTP.
async fn validator_socket(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => {
            let coordinator = Arc::clone(&state.coordinator);
            let config = state.websocket.clone();
            ws.max_message_size(config.max_message_size)
                .on_upgrade(move |socket| async move {
                    WebSocketHandler::with_config(coordinator, config)
                        .handle(socket)
                        .await;
                })
        }
        Err(rejection) => {
            debug!(reason = %rejection, "Plain HTTP request on socket path");
            (StatusCode::UPGRADE_REQUIRED, UPGRADE_REQUIRED_BODY).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use hub_coordinator::test_utils::FixedGeolocator;
    use hub_coordinator::{CoordinatorConfig, InMemoryRepository, MonitoringRepository, NewValidator};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        let coordinator = HubCoordinator::new(
            CoordinatorConfig::default(),
            repo.clone(),
            Arc::new(FixedGeolocator("Delhi".into())),
        )
        .unwrap();
        let state = AppState {
            coordinator: Arc::new(coordinator),
            catalog: repo.clone(),
            websocket: WebSocketConfig::default(),
            api: ApiConfig::default(),
        };
        (build_router(state), repo)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(api::USER_HEADER, "alice")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "healthy server");
    }

    #[tokio::test]
    async fn test_favicon_no_content() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/favicon.ico").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_plain_request_gets_426() {
        let (app, _) = app();
        for path in ["/", "/anything/else"] {
            let response = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], UPGRADE_REQUIRED_BODY.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_metrics_exposed() {
        watchtower_telemetry::metrics::register_metrics().unwrap();
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_website_lifecycle() {
        let (app, repo) = app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/website",
                serde_json::json!({ "url": "https://example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let targets = repo.list_active_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].owner_id, "alice");

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/website/status?websiteId={}", id))
                    .header(api::USER_HEADER, "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["url"], "https://example.com");
        assert_eq!(body["ticks"].as_array().unwrap().len(), 0);

        let response = app
            .clone()
            .oneshot(json_request(
                "DELETE",
                "/api/v1/website",
                serde_json::json!({ "websiteId": id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(repo.list_active_targets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_owner_cannot_see_or_delete() {
        let (app, repo) = app();
        let target = repo.create_target("https://example.com", "alice").await.unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/website/status?websiteId={}", target.id))
                    .header(api::USER_HEADER, "mallory")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::delete("/api/v1/website")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(api::USER_HEADER, "mallory")
                    .body(Body::from(
                        serde_json::json!({ "websiteId": target.id }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(repo.list_active_targets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let (app, repo) = app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/website",
                serde_json::json!({ "url": "example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(repo.list_active_targets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_owner_and_validator_listing() {
        let (app, repo) = app();
        repo.create_target("https://example.com", "1").await.unwrap();
        repo.create_validator(NewValidator {
            public_key: "key".into(),
            ip_address: "8.8.8.8".into(),
            location: "Delhi".into(),
        })
        .await
        .unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/websites").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app
            .oneshot(Request::get("/api/v1/validators").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body[0]["publicKey"], "key");
        assert_eq!(body[0]["pendingPayout"], 0);
    }
}
