// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard relay.

use thiserror::Error;

/// The primary error type used across all Switchboard crates.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A client request was missing required parameters or carried bad values.
    #[error("{0}")]
    Validation(String),

    /// An upstream API returned a non-2xx status or an unreadable body.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        /// HTTP status returned by the upstream, when one was received.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection authentication failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A keyed record (call, account, session) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport errors on the real-time channel or HTTP listener.
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Shorthand for a provider error without an HTTP status.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Message suitable for a `{ok:false, error}` acknowledgement.
    ///
    /// Validation errors surface verbatim so clients can match on them.
    pub fn ack_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Provider { message, .. } => message.clone(),
            Self::NotFound(what) => format!("{what} not found"),
            other => other.to_string(),
        }
    }
}
