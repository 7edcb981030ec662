// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR login through a bridge sidecar.
//!
//! The chat network's login SDK only runs inside its own runtime, so a small
//! sidecar hosts it and exposes three endpoints:
//!
//! - `POST {bridge}/qr-login` with `{userAgent}` answers `{ticket, qrPng}`
//!   where `qrPng` is the base64 QR image.
//! - `GET {bridge}/qr-login/{ticket}` answers `{status: "waiting"}`,
//!   `{status: "success", ownId, accountInfo, imei, userAgent, cookies}` or
//!   `{status: "failed", error}`.
//! - `POST {bridge}/cookie-login` with `{ownId, cookies, imei, userAgent}`
//!   logs a stored session in and answers `{userInfo}`, the network's
//!   user-info response for `ownId`. A rejected session answers non-2xx.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use switchboard_core::{LoginResult, LoginSdk, SwitchboardError};
use tracing::debug;

use crate::http;

const UPSTREAM: &str = "login bridge";

/// Upper bound for a whole handshake, scan included.
const LOGIN_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticket {
    ticket: String,
    qr_png: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum TicketState {
    Waiting,
    #[serde(rename_all = "camelCase")]
    Success {
        own_id: String,
        #[serde(default)]
        account_info: Option<Value>,
        imei: String,
        user_agent: String,
        cookies: Value,
    },
    Failed {
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCheck {
    #[serde(default)]
    user_info: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct LoginBridgeClient {
    client: reqwest::Client,
    base_url: Url,
    poll_interval: Duration,
}

impl LoginBridgeClient {
    pub fn new(base_url: &str) -> Result<Self, SwitchboardError> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(30), HeaderMap::new())?,
            base_url: http::parse_base(base_url)?,
            poll_interval: Duration::from_secs(2),
        })
    }

    /// Overrides the ticket poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn open_ticket(&self, user_agent: &str) -> Result<Ticket, SwitchboardError> {
        let url = http::endpoint(&self.base_url, &["qr-login"])?;
        let response = http::send(
            self.client.post(url).json(&json!({ "userAgent": user_agent })),
            UPSTREAM,
        )
        .await?;
        decode(http::read_json(response, UPSTREAM).await?)
    }

    async fn wait_for_result(&self, ticket: &str) -> Result<LoginResult, SwitchboardError> {
        let url = http::endpoint(&self.base_url, &["qr-login", ticket])?;
        loop {
            let response = http::send(self.client.get(url.clone()), UPSTREAM).await?;
            match decode(http::read_json(response, UPSTREAM).await?)? {
                TicketState::Waiting => tokio::time::sleep(self.poll_interval).await,
                TicketState::Success {
                    own_id,
                    account_info,
                    imei,
                    user_agent,
                    cookies,
                } => {
                    return Ok(LoginResult {
                        own_id,
                        account_info,
                        imei,
                        user_agent,
                        credentials: cookies,
                    });
                }
                TicketState::Failed { error } => {
                    return Err(SwitchboardError::provider(
                        error.unwrap_or_else(|| "login failed".to_string()),
                    ));
                }
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, SwitchboardError> {
    serde_json::from_value(body).map_err(|e| SwitchboardError::Provider {
        message: format!("{UPSTREAM} returned an unexpected body: {e}"),
        status: None,
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl LoginSdk for LoginBridgeClient {
    async fn login_qr(
        &self,
        qr_path: &Path,
        user_agent: &str,
    ) -> Result<LoginResult, SwitchboardError> {
        let ticket = self.open_ticket(user_agent).await?;
        let png = STANDARD
            .decode(ticket.qr_png.as_bytes())
            .map_err(|e| SwitchboardError::provider(format!("QR image is not base64: {e}")))?;
        tokio::fs::write(qr_path, &png)
            .await
            .map_err(|e| SwitchboardError::Internal(format!("writing QR image: {e}")))?;
        debug!(ticket = %ticket.ticket, path = %qr_path.display(), "QR image written");

        tokio::time::timeout(LOGIN_DEADLINE, self.wait_for_result(&ticket.ticket))
            .await
            .map_err(|_| SwitchboardError::Timeout {
                duration: LOGIN_DEADLINE,
            })?
    }

    async fn login_cookie(
        &self,
        own_id: &str,
        credentials: &Value,
        imei: &str,
        user_agent: &str,
    ) -> Result<Option<Value>, SwitchboardError> {
        let url = http::endpoint(&self.base_url, &["cookie-login"])?;
        let response = http::send(
            self.client.post(url).json(&json!({
                "ownId": own_id,
                "cookies": credentials,
                "imei": imei,
                "userAgent": user_agent,
            })),
            UPSTREAM,
        )
        .await?;
        let body = http::read_json(response, UPSTREAM).await?;
        if body.is_null() {
            return Ok(None);
        }
        let check: SessionCheck = decode(body)?;
        Ok(check.user_info.filter(|info| !info.is_null()))
    }
}
