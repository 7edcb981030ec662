// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation key normalization.
//!
//! Clients refer to a conversation either by its bare key (`"123"`), by the
//! composite id the aggregator returns (`"pageA_123"`), or by a platform id
//! that must stay intact (`"ttm_abc_def"`). Watches and message fetches use
//! the canonical form.

/// Prefixes of platform ids that are already canonical.
pub const PLATFORM_PREFIXES: &[&str] = &["ttm_"];

pub fn is_platform_prefixed(raw: &str) -> bool {
    PLATFORM_PREFIXES.iter().any(|prefix| raw.starts_with(prefix))
}

/// Canonical key for `raw`. Defined for every input, including `""`.
pub fn canonical_conversation_key(raw: &str) -> &str {
    if is_platform_prefixed(raw) {
        return raw;
    }
    match raw.split_once('_') {
        Some((_, rest)) => rest,
        None => raw,
    }
}
