// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liveness checks for linked accounts.
//!
//! Each stored session is logged back in by cookie and the network's
//! user-info answer decides whether the account is still `active`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use switchboard_core::{Account, AccountStatus, AccountStore, LoginSdk, SwitchboardError};
use tracing::{info, warn};

/// Minutes after its last action that a profile still counts as active.
const ACTIVITY_WINDOW_MINUTES: i64 = 5;

/// Outcome of checking one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub account_key: String,
    pub status: AccountStatus,
    pub error: Option<String>,
    /// Whether the stored status changed.
    pub updated: bool,
    pub previous_status: AccountStatus,
}

/// Decides an account's status from its user-info response.
///
/// A response is well-formed when it carries `phonebook_version`,
/// `changed_profiles` or `unchanged_profiles`. The account's own profile is
/// looked up under `own_id` in the changed profiles, then the unchanged ones,
/// falling back to the first entry of each. `isActive`/`isActiveWeb` equal to
/// 1 wins; otherwise `lastActionTime` must be within five minutes. A
/// well-formed response without a usable profile counts as active.
pub fn classify_user_info(
    own_id: &str,
    info: Option<&Value>,
    now: DateTime<Utc>,
) -> AccountStatus {
    let Some(info) = info.and_then(Value::as_object) else {
        return AccountStatus::Disconnected;
    };
    let well_formed = ["phonebook_version", "changed_profiles", "unchanged_profiles"]
        .iter()
        .any(|key| info.contains_key(*key));
    if !well_formed {
        return AccountStatus::Disconnected;
    }

    let profile = ["changed_profiles", "unchanged_profiles"]
        .iter()
        .filter_map(|key| info.get(*key).and_then(Value::as_object))
        .find_map(|profiles| {
            profiles
                .get(own_id)
                .or_else(|| profiles.values().next())
                .and_then(Value::as_object)
        });
    let Some(profile) = profile else {
        return AccountStatus::Active;
    };

    let flag_set = |key: &str| profile.get(key).and_then(Value::as_i64) == Some(1);
    if flag_set("isActiveWeb") || flag_set("isActive") {
        return AccountStatus::Active;
    }
    let Some(last_action) = profile.get("lastActionTime").filter(|v| is_truthy(v)) else {
        return AccountStatus::Active;
    };
    match parse_action_time(last_action) {
        Some(at) if now - at < TimeDelta::minutes(ACTIVITY_WINDOW_MINUTES) => AccountStatus::Active,
        _ => AccountStatus::Disconnected,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Epoch milliseconds or an RFC 3339 string.
fn parse_action_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(millis) => DateTime::from_timestamp_millis(millis),
            Err(_) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|at| at.with_timezone(&Utc)),
        },
        _ => None,
    }
}

/// Re-checks every stored account and records the new statuses.
///
/// A rejected cookie login marks the account disconnected and carries the
/// error in its report. Only a store failure on [`AccountStore::list`]
/// aborts the whole run.
pub async fn refresh_account_statuses(
    sdk: &dyn LoginSdk,
    store: &dyn AccountStore,
) -> Result<Vec<StatusReport>, SwitchboardError> {
    let accounts = store.list().await?;
    let mut reports = Vec::with_capacity(accounts.len());
    for account in &accounts {
        reports.push(refresh_one(sdk, store, account).await);
    }
    info!(
        accounts = reports.len(),
        changed = reports.iter().filter(|r| r.updated).count(),
        "account statuses refreshed"
    );
    Ok(reports)
}

async fn refresh_one(
    sdk: &dyn LoginSdk,
    store: &dyn AccountStore,
    account: &Account,
) -> StatusReport {
    let key = &account.account_key;
    let previous = account.status;
    let mut report = StatusReport {
        account_key: key.clone(),
        status: AccountStatus::Disconnected,
        error: None,
        updated: false,
        previous_status: previous,
    };

    let has_session = !account.session.credentials.is_null()
        && !account.device.imei.trim().is_empty()
        && !account.device.user_agent.trim().is_empty();
    let checked = if has_session {
        sdk.login_cookie(
            key,
            &account.session.credentials,
            &account.device.imei,
            &account.device.user_agent,
        )
        .await
    } else {
        Err(SwitchboardError::Validation(
            "missing cookies or device info".into(),
        ))
    };

    match checked {
        Ok(user_info) => {
            report.status = classify_user_info(key, user_info.as_ref(), Utc::now());
        }
        Err(e) => {
            warn!(account_key = %key, error = %e, "cookie login failed");
            report.error = Some(e.ack_message());
            // A failed login leaves last_active_at alone unless the status flips.
            if previous == AccountStatus::Disconnected {
                return report;
            }
        }
    }

    match store.update_status(key, report.status).await {
        Ok(_) => report.updated = report.status != previous,
        Err(e) => {
            warn!(account_key = %key, error = %e, "account status write failed");
            report.error = Some(e.ack_message());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn millis_ago(minutes: i64) -> i64 {
        (now() - TimeDelta::minutes(minutes)).timestamp_millis()
    }

    fn classify(info: Value) -> AccountStatus {
        classify_user_info("42", Some(&info), now())
    }

    #[test]
    fn active_flags_win() {
        assert_eq!(
            classify(json!({"changed_profiles": {"42": {"isActive": 1, "lastActionTime": millis_ago(600)}}})),
            AccountStatus::Active
        );

        assert_eq!(
            classify(json!({"unchanged_profiles": {"42": {"isActiveWeb": 1}}})),
            AccountStatus::Active
        );
    }

    #[test]
    fn last_action_time_decides_within_window() {
        assert_eq!(
            classify(json!({"changed_profiles": {"42": {"isActive": 0, "lastActionTime": millis_ago(2)}}})),
            AccountStatus::Active
        );

        assert_eq!(
            classify(json!({"changed_profiles": {"42": {"lastActionTime": millis_ago(6)}}})),
            AccountStatus::Disconnected
        );

        assert_eq!(
            classify(json!({"changed_profiles": {"42": {"lastActionTime": "2026-03-01T11:58:00Z"}}})),
            AccountStatus::Active
        );

        assert_eq!(
            classify(json!({"changed_profiles": {"42": {"lastActionTime": "yesterday"}}})),
            AccountStatus::Disconnected
        );
    }

    #[test]
    fn other_profile_is_used_when_own_id_is_absent() {
        assert_eq!(
            classify(json!({"changed_profiles": {"42_0": {"lastActionTime": millis_ago(30)}}})),
            AccountStatus::Disconnected
        );
    }

    #[test]
    fn well_formed_response_without_profile_is_active() {
        assert_eq!(classify(json!({"phonebook_version": 7})), AccountStatus::Active);

        assert_eq!(
            classify(json!({"changed_profiles": {"42": {"displayName": "Ann"}}})),
            AccountStatus::Active
        );
    }

    #[test]
    fn missing_or_unknown_response_is_disconnected() {
        assert_eq!(classify_user_info("42", None, now()), AccountStatus::Disconnected);
        assert_eq!(classify(json!({"error_code": 0})), AccountStatus::Disconnected);
        assert_eq!(classify(json!("ok")), AccountStatus::Disconnected);
    }
}
