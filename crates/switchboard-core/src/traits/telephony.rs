// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound telephony provider.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SwitchboardError;

#[async_trait]
pub trait Telephony: Send + Sync + 'static {
    /// Requests an outbound call to `phone_number`, tagged with `correlation_id`.
    async fn place_call(
        &self,
        phone_number: &str,
        correlation_id: &str,
    ) -> Result<Value, SwitchboardError>;

    /// Cancels a previously placed call.
    async fn cancel_call(&self, correlation_id: &str) -> Result<(), SwitchboardError>;
}
