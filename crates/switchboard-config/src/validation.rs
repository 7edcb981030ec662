// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: non-zero intervals, URL schemes,
//! and settings that only make sense together.

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.server.port == 0 {
        fail("server.port must be between 1 and 65535".to_string());
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if config.server.cors_origins.iter().any(|o| o.trim().is_empty()) {
        fail("server.cors_origins must not contain empty entries".to_string());
    }

    check_url(&mut fail, "server.public_base_url", &config.server.public_base_url);
    check_url(&mut fail, "chat.base_url", &config.chat.base_url);
    check_url(&mut fail, "telephony.base_url", &config.telephony.base_url);
    if let Some(bridge) = &config.qr.bridge_url {
        check_url(&mut fail, "qr.bridge_url", bridge);
    }

    if config.auth.enabled
        && config
            .auth
            .secret
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
    {
        fail("auth.secret is required when auth.enabled = true".to_string());
    }

    if config.poll.list_interval_ms == 0 {
        fail("poll.list_interval_ms must be greater than 0".to_string());
    }
    if config.poll.min_message_interval_ms == 0 {
        fail("poll.min_message_interval_ms must be greater than 0".to_string());
    }
    if config.poll.min_message_interval_ms > config.poll.message_interval_ms {
        fail(format!(
            "poll.min_message_interval_ms ({}) must not exceed poll.message_interval_ms ({})",
            config.poll.min_message_interval_ms, config.poll.message_interval_ms
        ));
    }

    if config.telephony.watchdog_secs == 0 {
        fail("telephony.watchdog_secs must be greater than 0".to_string());
    }
    if config.telephony.sweep_interval_secs == 0 {
        fail("telephony.sweep_interval_secs must be greater than 0".to_string());
    }
    if config.chat.timeout_secs == 0 || config.telephony.timeout_secs == 0 {
        fail("provider timeout_secs values must be greater than 0".to_string());
    }

    if config.qr.enabled {
        if config.qr.artifact_dir.trim().is_empty() {
            fail("qr.artifact_dir must not be empty".to_string());
        }
        if config.qr.ready_attempts == 0 || config.qr.ready_poll_ms == 0 {
            fail("qr.ready_attempts and qr.ready_poll_ms must be greater than 0".to_string());
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(fail: &mut impl FnMut(String), key: &str, value: &str) {
    let value = value.trim();
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        fail(format!("{key} must start with http:// or https://, got `{value}`"));
    }
}
