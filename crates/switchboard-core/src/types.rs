// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the relay, the gateway, and the provider clients.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::SwitchboardError;

/// Unique identifier for one live real-time connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Event names used on the real-time surface.
pub mod events {
    pub const LIST_GET: &str = "list:get";
    pub const LIST_LOAD_MORE: &str = "list:loadMore";
    pub const LIST_SEARCH: &str = "list:search";
    pub const LIST_PATCH: &str = "list:patch";

    pub const ITEM_GET: &str = "item:get";
    pub const ITEM_WATCH_START: &str = "item:watchStart";
    pub const ITEM_WATCH_STOP: &str = "item:watchStop";
    pub const ITEM_NEW: &str = "item:new";

    pub const CALL_START: &str = "call:start";
    pub const CALL_END: &str = "call:end";
    pub const CALL_SYNC: &str = "call:sync";
    pub const CALL_STATUS: &str = "call:status";
    pub const CALL_ENDED: &str = "call:ended";
    pub const CALL_ERROR: &str = "call:error";

    pub const QR_START: &str = "qr:start";
    pub const QR_STOP: &str = "qr:stop";
    pub const QR_READY: &str = "qr:ready";
    pub const QR_LOGIN_SUCCESS: &str = "qr:loginSuccess";
    pub const QR_ERROR: &str = "qr:error";

    pub const ACCOUNTS_LIST: &str = "accounts:list";
    pub const ACCOUNTS_DELETE: &str = "accounts:delete";
    pub const ACCOUNTS_REFRESH_STATUS: &str = "accounts:refreshStatus";
}

/// A frame sent by a client: `{ "event": "...", "id": 7, "data": {...} }`.
///
/// `id` is present when the client wants an acknowledgement.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub data: Value,
}

/// Reply to an [`InboundFrame`] that carried an `id`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AckFrame {
    pub ack: u64,
    pub data: Value,
}

/// A server-initiated event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushFrame {
    pub event: String,
    pub data: Value,
}

/// Parameters for a conversation list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Page or inbox identifier on the chat aggregator.
    pub scope: String,
    pub token: String,
    /// Number of items the client already holds; `0` means the first page.
    pub resume_count: u64,
}

/// Parameters for a message fetch on one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub scope: String,
    pub token: String,
    /// Canonical conversation key.
    pub item_key: String,
    pub owner_key: Option<String>,
    pub count: u64,
}

/// Lifecycle state of a linked chat account.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Disconnected,
    Blocked,
}

/// How an account's current session was established.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoginMethod {
    #[default]
    Qr,
    Cookie,
}

/// Public profile summary of a linked account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub zalo_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub phone_masked: String,
}

/// Device fingerprint the session was created with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub imei: String,
    pub user_agent: String,
    pub device_name: String,
}

/// Session state of a linked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSession {
    /// Opaque credential blob (cookies) handed back by the login SDK.
    pub credentials: Value,
    pub last_active_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
    pub last_login_method: LoginMethod,
    pub session_version: u32,
}

/// A persisted account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_key: String,
    pub profile: AccountProfile,
    pub device: DeviceFingerprint,
    pub status: AccountStatus,
    pub session: AccountSession,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client-facing view of an [`Account`]: no credentials, no device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_key: String,
    pub zalo_id: String,
    pub display_name: String,
    pub avatar: String,
    pub phone_masked: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            account_key: account.account_key.clone(),
            zalo_id: account.profile.zalo_id.clone(),
            display_name: account.profile.display_name.clone(),
            avatar: account.profile.avatar.clone(),
            phone_masked: account.profile.phone_masked.clone(),
            status: account.status,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Input to [`AccountStore::upsert`](crate::traits::AccountStore::upsert).
#[derive(Debug, Clone, PartialEq)]
pub struct AccountUpsert {
    pub account_key: String,
    pub profile: AccountProfile,
    pub device: DeviceFingerprint,
    pub credentials: Value,
    pub login_method: LoginMethod,
}

impl AccountUpsert {
    /// Checks the fields every store requires before writing.
    pub fn validate(&self) -> Result<(), SwitchboardError> {
        if self.account_key.trim().is_empty() {
            return Err(SwitchboardError::Validation(
                "accountKey is required".into(),
            ));
        }
        if self.profile.zalo_id.trim().is_empty() {
            return Err(SwitchboardError::Validation(
                "profile.zaloId is required".into(),
            ));
        }
        if self.device.imei.trim().is_empty() || self.device.user_agent.trim().is_empty() {
            return Err(SwitchboardError::Validation(
                "device.imei and device.userAgent are required".into(),
            ));
        }
        if self.credentials.is_null() {
            return Err(SwitchboardError::Validation(
                "session credentials are required".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a completed QR login handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResult {
    /// Account identifier on the chat network.
    pub own_id: String,
    /// Raw account info, when the SDK could fetch it.
    pub account_info: Option<Value>,
    pub imei: String,
    pub user_agent: String,
    pub credentials: Value,
}
