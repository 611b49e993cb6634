use crate::connection::serve_socket;
use crate::connector::{ShellConnector, SshConnector};
use crate::registry::ConnectionRegistry;
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tuicat_config::{BridgeConfig, WEBSOCKET_URL_ENV};

#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn ShellConnector>,
    pub registry: ConnectionRegistry,
    pub websocket_url: Option<String>,
}

impl AppState {
    pub fn new(connector: Arc<dyn ShellConnector>, websocket_url: Option<String>) -> Self {
        Self {
            connector,
            registry: ConnectionRegistry::new(),
            websocket_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryRequest {
    action: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/ssh-proxy", get(proxy_status).post(proxy_action))
        .with_state(state)
}

async fn ws_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| {
            serve_socket(socket, state.connector.clone(), state.registry.clone())
        }),
        Err(rejection) => {
            debug!(reason = %rejection, "refusing non-websocket request");
            (StatusCode::UPGRADE_REQUIRED, "Upgrade Required").into_response()
        }
    }
}

async fn proxy_status() -> Response {
    Json(json!({
        "success": true,
        "message": "SSH proxy running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn proxy_action(
    State(state): State<AppState>,
    body: Result<Json<DiscoveryRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable discovery request");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };
    match request.action.as_deref() {
        Some("get_connection_info") => match state.websocket_url.as_deref() {
            Some(url) => Json(json!({ "success": true, "websocketUrl": url })).into_response(),
            None => failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("{} environment variable not set", WEBSOCKET_URL_ENV),
            ),
        },
        Some("health_check") => Json(json!({
            "success": true,
            "status": "available",
            "url": state.websocket_url,
            "activeConnections": state.registry.len(),
        }))
        .into_response(),
        _ => failure(StatusCode::BAD_REQUEST, "Invalid action"),
    }
}

fn failure(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

/// Binds the listen address and serves until the task is dropped.
pub async fn serve(settings: BridgeConfig) -> Result<()> {
    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("binding {}", settings.listen_addr))?;
    let state = AppState::new(
        Arc::new(SshConnector::new(settings.clone())),
        settings.websocket_url.clone(),
    );
    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    match &state.websocket_url {
        Some(url) => info!(%addr, websocket_url = %url, "bridge listening"),
        None => warn!(%addr, "bridge listening without a public websocket url"),
    }
    axum::serve(listener, router(state))
        .await
        .context("bridge server stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectRequest, OpenedShell};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    struct Unused;

    #[async_trait]
    impl ShellConnector for Unused {
        async fn open(&self, _request: ConnectRequest) -> Result<OpenedShell> {
            anyhow::bail!("not used")
        }
    }

    fn app(url: Option<&str>) -> Router {
        router(AppState::new(Arc::new(Unused), url.map(str::to_string)))
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/api/ssh-proxy")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn connection_info_returns_url() {
        let (status, body) = post(
            app(Some("wss://bridge.example/ws")),
            r#"{"action":"get_connection_info"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["websocketUrl"], "wss://bridge.example/ws");
    }

    #[tokio::test]
    async fn connection_info_without_url_is_500() {
        let (status, body) = post(app(None), r#"{"action":"get_connection_info"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "TUICAT_WEBSOCKET_URL environment variable not set"
        );
    }

    #[tokio::test]
    async fn health_check_reports_available() {
        let (status, body) = post(app(Some("ws://h/ws")), r#"{"action":"health_check"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "available");
        assert_eq!(body["url"], "ws://h/ws");
        assert_eq!(body["activeConnections"], 0);
    }

    #[tokio::test]
    async fn unknown_action_and_bad_body() {
        let (status, body) = post(app(None), r#"{"action":"reboot"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action");

        let (status, body) = post(app(None), "not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn status_and_plain_ws_get() {
        let response = app(None)
            .oneshot(Request::get("/api/ssh-proxy").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "SSH proxy running");
        assert!(body["timestamp"].is_string());

        let response = app(None)
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    }
}
