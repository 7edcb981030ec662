// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR-login chat SDK.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SwitchboardError;
use crate::types::LoginResult;

/// Drives a QR login handshake and re-validates stored sessions.
#[async_trait]
pub trait LoginSdk: Send + Sync + 'static {
    /// Writes the QR image to `qr_path` as soon as the provider issues it,
    /// then resolves once the user has scanned and confirmed (or the
    /// handshake failed).
    async fn login_qr(
        &self,
        qr_path: &Path,
        user_agent: &str,
    ) -> Result<LoginResult, SwitchboardError>;

    /// Logs in with stored session cookies and fetches the account's own
    /// user info.
    ///
    /// `Ok(None)` means the login worked but the network returned no user
    /// info. A rejected session is an error.
    async fn login_cookie(
        &self,
        own_id: &str,
        credentials: &Value,
        imei: &str,
        user_agent: &str,
    ) -> Result<Option<Value>, SwitchboardError>;
}
