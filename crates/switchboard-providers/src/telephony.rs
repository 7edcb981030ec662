// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the telephony provider's outbound call API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use switchboard_config::model::TelephonyConfig;
use switchboard_core::{SwitchboardError, Telephony};
use tracing::debug;

use crate::http;

const UPSTREAM: &str = "telephony";

#[derive(Debug, Serialize)]
struct OutboundCallRequest<'a> {
    tenant_id: Option<&'a str>,
    to: &'a str,
    request_id: &'a str,
}

/// Places and cancels outbound calls.
#[derive(Debug, Clone)]
pub struct TelephonyClient {
    client: reqwest::Client,
    base_url: Url,
    tenant_id: Option<String>,
}

impl TelephonyClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        tenant_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SwitchboardError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                SwitchboardError::Config(format!("invalid telephony API key header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            client: http::build_client(timeout, headers)?,
            base_url: http::parse_base(base_url)?,
            tenant_id,
        })
    }

    pub fn from_config(config: &TelephonyConfig) -> Result<Self, SwitchboardError> {
        Self::new(
            &config.base_url,
            config.api_key.as_deref(),
            config.tenant_id.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Telephony for TelephonyClient {
    async fn place_call(
        &self,
        phone_number: &str,
        correlation_id: &str,
    ) -> Result<Value, SwitchboardError> {
        let url = http::endpoint(&self.base_url, &["v1", "calls", "outbound"])?;
        let body = OutboundCallRequest {
            tenant_id: self.tenant_id.as_deref(),
            to: phone_number,
            request_id: correlation_id,
        };
        debug!(call_id = correlation_id, "placing outbound call");
        let response = http::send(self.client.post(url).json(&body), UPSTREAM).await?;
        http::read_json(response, UPSTREAM).await
    }

    async fn cancel_call(&self, correlation_id: &str) -> Result<(), SwitchboardError> {
        let url = http::endpoint(&self.base_url, &["v1", "calls", correlation_id, "cancel"])?;
        let response = http::send(self.client.post(url), UPSTREAM).await?;
        http::ensure_success(response, UPSTREAM).await?;
        Ok(())
    }
}
