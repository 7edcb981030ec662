// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock telephony provider.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_core::{SwitchboardError, Telephony};
use tokio::sync::Mutex;

/// Accepts every call unless told to reject. Cancels always fail when
/// `failing_cancel` is set, which the relay must tolerate.
#[derive(Debug, Default)]
pub struct MockTelephony {
    reject_with: Option<String>,
    failing_cancel: bool,
    delay: Option<Duration>,
    placed: Mutex<Vec<(String, String)>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `place_call` fails with `message`.
    pub fn rejecting(message: &str) -> Self {
        Self {
            reject_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_failing_cancel(mut self) -> Self {
        self.failing_cancel = true;
        self
    }

    /// `place_call` answers after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(phone_number, call_id)` of every placement, in order.
    pub async fn placed(&self) -> Vec<(String, String)> {
        self.placed.lock().await.clone()
    }

    pub async fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().await.clone()
    }
}

#[async_trait]
impl Telephony for MockTelephony {
    async fn place_call(
        &self,
        phone_number: &str,
        correlation_id: &str,
    ) -> Result<Value, SwitchboardError> {
        self.placed
            .lock()
            .await
            .push((phone_number.to_string(), correlation_id.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reject_with {
            Some(message) => Err(SwitchboardError::Provider {
                message: message.clone(),
                status: Some(422),
                source: None,
            }),
            None => Ok(json!({"request_id": correlation_id, "status": "queued"})),
        }
    }

    async fn cancel_call(&self, call_id: &str) -> Result<(), SwitchboardError> {
        self.cancelled.lock().await.push(call_id.to_string());
        if self.failing_cancel {
            return Err(SwitchboardError::provider("cancel rejected"));
        }
        Ok(())
    }
}
