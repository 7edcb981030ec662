// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use switchboard_config::SwitchboardConfig;
use switchboard_config::model::ServerConfig;
use switchboard_core::{Emitter, SwitchboardError};
use switchboard_relay::{EndReason, Relay};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::TokenVerifier;
use crate::hub::ConnectionHub;
use crate::ws;

/// Values reported by `/health` that do not change at runtime.
#[derive(Debug, Clone)]
pub struct HealthInfo {
    pub list_interval_ms: u64,
    pub message_interval_ms: u64,
    pub origins: Vec<String>,
    pub log_level: String,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub relay: Arc<Relay>,
    pub hub: Arc<ConnectionHub>,
    /// Present when connections must authenticate.
    pub verifier: Option<Arc<TokenVerifier>>,
    /// Expected `x-api-key` on admin routes; `None` leaves them open.
    pub admin_api_key: Option<String>,
    pub info: Arc<HealthInfo>,
}

impl GatewayState {
    pub fn from_config(
        config: &SwitchboardConfig,
        relay: Arc<Relay>,
        hub: Arc<ConnectionHub>,
    ) -> Result<Self, SwitchboardError> {
        let verifier = if config.auth.enabled {
            let secret = config.auth.secret.as_deref().ok_or_else(|| {
                SwitchboardError::Config("auth.enabled requires auth.secret".into())
            })?;
            Some(Arc::new(TokenVerifier::new(secret)))
        } else {
            None
        };

        Ok(Self {
            relay,
            hub,
            verifier,
            admin_api_key: config.auth.admin_api_key.clone(),
            info: Arc::new(HealthInfo {
                list_interval_ms: config.poll.list_interval_ms,
                message_interval_ms: config.poll.message_interval_ms,
                origins: config.server.cors_origins.clone(),
                log_level: config.logging.level.clone(),
            }),
        })
    }

    fn admin_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.admin_api_key else {
            return true;
        };
        headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|key| key == expected)
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn failure(status: StatusCode, error: &str) -> Response {
    reply(status, json!({"ok": false, "error": error}))
}

/// GET /health
async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "pollMs": state.info.list_interval_ms,
        "messagePollMs": state.info.message_interval_ms,
        "origins": state.info.origins,
        "logLevel": state.info.log_level,
        "connections": state.hub.connection_count(),
        "activeCalls": state.relay.calls().active_count(),
        "watches": state.relay.watches().total_watches(),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct EmitRequest {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// POST /api/emit
///
/// Broadcasts an arbitrary event to every connection.
async fn emit(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    if !state.admin_authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Invalid API key");
    }
    let request: EmitRequest = body
        .ok()
        .and_then(|Json(v)| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let Some(event) = request.event.filter(|e| !e.trim().is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "Missing \"event\"");
    };

    let delivered = state.hub.broadcast(&event, request.payload);
    info!(event, delivered, "admin emit");
    reply(StatusCode::OK, json!({"ok": true}))
}

#[derive(Debug, Default, Deserialize)]
struct CallStatusRequest {
    #[serde(default)]
    status: String,
}

/// POST /api/calls/{callId}/status
///
/// Telephony webhook reporting that a call was answered or hung up.
async fn call_status(
    State(state): State<GatewayState>,
    UrlPath(call_id): UrlPath<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    if !state.admin_authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Invalid API key");
    }
    let request: CallStatusRequest = body
        .ok()
        .and_then(|Json(v)| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let calls = state.relay.calls();
    match request.status.as_str() {
        "accepted" => match calls.mark_accepted(&call_id) {
            Ok(record) => reply(
                StatusCode::OK,
                json!({"ok": true, "call": record.status_payload()}),
            ),
            Err(e @ SwitchboardError::NotFound(_)) => {
                failure(StatusCode::NOT_FOUND, &e.ack_message())
            }
            Err(e) => failure(StatusCode::CONFLICT, &e.ack_message()),
        },
        "ended" => {
            if calls.end_call(&call_id, EndReason::Provider).await {
                reply(StatusCode::OK, json!({"ok": true}))
            } else {
                failure(StatusCode::NOT_FOUND, "call not found")
            }
        }
        _ => failure(StatusCode::BAD_REQUEST, "status must be accepted or ended"),
    }
}

/// CORS for the configured origins; a lone `"*"` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
}

/// Builds the full application router.
///
/// Routes:
/// - GET /health
/// - GET /ws (auth during the handshake)
/// - POST /api/emit, POST /api/calls/{callId}/status (admin key)
/// - GET /qr/{file} when `qr_dir` is set
pub fn router(state: GatewayState, qr_dir: Option<&Path>) -> Router {
    let cors = cors_layer(&state.info.origins);

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_handler))
        .route("/api/emit", post(emit))
        .route("/api/calls/{call_id}/status", post(call_status))
        .with_state(state);

    if let Some(dir) = qr_dir {
        app = app.nest_service("/qr", ServeDir::new(dir));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Binds the listener described by `config`.
pub async fn bind(config: &ServerConfig) -> Result<tokio::net::TcpListener, SwitchboardError> {
    let addr = format!("{}:{}", config.host, config.port);
    tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serves `app` until `shutdown` resolves, then drains open requests.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SwitchboardError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "gateway listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SwitchboardError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_is_permissive() {
        // Building both variants must not panic on header validation.
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }

    #[test]
    fn emit_request_tolerates_missing_fields() {
        let req: EmitRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.event.is_none());
        assert!(req.payload.is_null());
    }
}
