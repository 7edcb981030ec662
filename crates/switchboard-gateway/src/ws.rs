// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint.
//!
//! Client -> Server (JSON):
//! ```json
//! {"event": "list:get", "id": 1, "data": {"scope": "123", "token": "..."}}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"ack": 1, "data": {"ok": true, "items": [...]}}
//! {"event": "list:patch", "data": {"scope": "123", "operationKind": "upsert", "items": [...]}}
//! ```

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use switchboard_core::{ConnectionId, Emitter, InboundFrame};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::auth::{Principal, extract_token};
use crate::server::GatewayState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    token: Option<String>,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"ok": false, "error": message})),
    )
        .into_response()
}

/// `GET /ws`: authenticates, then upgrades.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let principal = match &state.verifier {
        Some(verifier) => {
            let Some(token) = extract_token(&headers, params.token.as_deref()) else {
                warn!("connection rejected: missing token");
                return unauthorized("Missing token");
            };
            match verifier.verify(&token) {
                Ok(principal) => Some(principal),
                Err(e) => {
                    warn!(error = %e, "connection rejected");
                    return unauthorized("Invalid token");
                }
            }
        }
        None => None,
    };

    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state, principal)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Runs one connection until the client goes away.
///
/// Inbound events are handled on their own tasks so a slow provider call
/// never stalls the reader. Outbound frames flow through the hub queue.
async fn handle_socket(socket: WebSocket, state: GatewayState, principal: Option<Principal>) {
    let connection = ConnectionId(uuid::Uuid::new_v4().to_string());
    let mut outbound = state.hub.register(connection.clone());
    if let Some(principal) = &principal {
        state.hub.join_group(&connection, &principal.user_group());
        if let Some(role) = principal.role_group() {
            state.hub.join_group(&connection, &role);
        }
    }
    state.relay.connect(&connection);
    info!(
        connection_id = %connection,
        uid = principal.as_ref().map(|p| p.uid.as_str()),
        "connection opened"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut in_flight = JoinSet::new();
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let frame: InboundFrame = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(connection_id = %connection, error = %e, "invalid frame");
                        continue;
                    }
                };
                let state = state.clone();
                let connection = connection.clone();
                in_flight.spawn(async move {
                    let ack = state
                        .relay
                        .handle(&connection, &frame.event, frame.data)
                        .await;
                    if let Some(id) = frame.id {
                        state.hub.ack(&connection, id, ack);
                    }
                });
                while in_flight.try_join_next().is_some() {}
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    in_flight.shutdown().await;
    state.relay.disconnect(&connection).await;
    state.hub.unregister(&connection);
    writer.abort();
    debug!(connection_id = %connection, "connection closed");
}
