// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Every section is optional and falls back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Connection and admin authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Watch intervals.
    #[serde(default)]
    pub poll: PollConfig,

    /// Chat aggregation API.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Telephony API and call lifecycle timing.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// QR login sessions.
    #[serde(default)]
    pub qr: QrConfig,

    /// Account database.
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. A single `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Externally reachable base URL, used to build QR image links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_public_base_url() -> String {
    "http://localhost:3001".to_string()
}

/// Authentication configuration.
///
/// Connection auth is off by default for deployments that authenticate upstream.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Require a signed token on WebSocket connect.
    #[serde(default)]
    pub enabled: bool,

    /// HS256 secret used to verify connection tokens.
    #[serde(default)]
    pub secret: Option<String>,

    /// Shared secret expected in `x-api-key` on admin routes. Unset disables the check.
    #[serde(default)]
    pub admin_api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "admin_api_key",
                &self.admin_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Poll interval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Conversation list poll interval.
    #[serde(default = "default_list_interval_ms")]
    pub list_interval_ms: u64,

    /// Message watch interval used when the client does not pass one.
    #[serde(default = "default_message_interval_ms")]
    pub message_interval_ms: u64,

    /// Floor applied to client-supplied message watch intervals.
    #[serde(default = "default_min_message_interval_ms")]
    pub min_message_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            list_interval_ms: default_list_interval_ms(),
            message_interval_ms: default_message_interval_ms(),
            min_message_interval_ms: default_min_message_interval_ms(),
        }
    }
}

impl PollConfig {
    pub fn list_interval(&self) -> Duration {
        Duration::from_millis(self.list_interval_ms)
    }
}

fn default_list_interval_ms() -> u64 {
    3000
}

fn default_message_interval_ms() -> u64 {
    2500
}

fn default_min_message_interval_ms() -> u64 {
    1000
}

/// Chat aggregation API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_chat_base_url() -> String {
    "https://pancake.vn/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// Telephony API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelephonyConfig {
    #[serde(default = "default_telephony_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a ringing call may wait for an answer.
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,

    /// Age after which the janitor force-ends a call.
    #[serde(default = "default_stale_call_secs")]
    pub stale_call_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            base_url: default_telephony_base_url(),
            api_key: None,
            tenant_id: None,
            timeout_secs: default_timeout_secs(),
            watchdog_secs: default_watchdog_secs(),
            stale_call_secs: default_stale_call_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl std::fmt::Debug for TelephonyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelephonyConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("tenant_id", &self.tenant_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("watchdog_secs", &self.watchdog_secs)
            .field("stale_call_secs", &self.stale_call_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

fn default_telephony_base_url() -> String {
    "https://api.omicrm.com".to_string()
}

fn default_watchdog_secs() -> u64 {
    45
}

fn default_stale_call_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// QR login configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory QR images are written to and served from.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Base URL of the login bridge sidecar. Unset means QR login is unavailable.
    #[serde(default)]
    pub bridge_url: Option<String>,

    /// Delay between checks for the QR image.
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,

    /// Number of checks before giving up on the QR image.
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            artifact_dir: default_artifact_dir(),
            bridge_url: None,
            ready_poll_ms: default_ready_poll_ms(),
            ready_attempts: default_ready_attempts(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_artifact_dir() -> String {
    "./data/qr".to_string()
}

fn default_ready_poll_ms() -> u64 {
    200
}

fn default_ready_attempts() -> u32 {
    50
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "./data/switchboard.db".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
