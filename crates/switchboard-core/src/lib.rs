// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard relay.
//!
//! This crate holds the error type, the wire and account types, and the
//! collaborator traits (chat aggregator, telephony, login SDK, account store,
//! emitter) that the relay core is written against.

pub mod conversation;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use conversation::canonical_conversation_key;
pub use error::SwitchboardError;
pub use types::{
    Account, AccountProfile, AccountSession, AccountStatus, AccountSummary, AccountUpsert,
    AckFrame,
    ConnectionId, DeviceFingerprint, InboundFrame, ListQuery, LoginMethod, LoginResult,
    MessageQuery, PushFrame, events,
};

pub use traits::{AccountStore, ChatAggregator, Emitter, LoginSdk, Telephony};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upsert() -> AccountUpsert {
        AccountUpsert {
            account_key: "zalo:42".into(),
            profile: AccountProfile {
                zalo_id: "42".into(),
                display_name: "Ann".into(),
                ..Default::default()
            },
            device: DeviceFingerprint {
                imei: "imei-1".into(),
                user_agent: "Mozilla/5.0".into(),
                device_name: "bot-web".into(),
            },
            credentials: json!([{"name": "zpw_sek", "value": "x"}]),
            login_method: LoginMethod::Qr,
        }
    }

    #[test]
    fn account_summary_leaves_out_session_and_device() {
        let now = chrono::Utc::now();
        let input = upsert();
        let account = Account {
            account_key: input.account_key,
            profile: input.profile,
            device: input.device,
            status: AccountStatus::Disconnected,
            session: AccountSession {
                credentials: input.credentials,
                last_active_at: now,
                last_login_at: now,
                last_login_method: LoginMethod::Qr,
                session_version: 1,
            },
            created_at: now,
            updated_at: now,
        };

        let summary = serde_json::to_value(AccountSummary::from(&account)).unwrap();
        let keys: Vec<&str> = summary.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys.len(),
            8,
            "unexpected summary keys: {keys:?}"
        );
        assert_eq!(summary["zaloId"], "42");
        assert_eq!(summary["status"], "disconnected");
        let text = summary.to_string();
        assert!(!text.contains("zpw_sek"));
        assert!(!text.contains("imei-1"));
        assert!(!text.contains("Mozilla"));
    }

    #[test]
    fn switchboard_error_has_all_variants() {
        let _config = SwitchboardError::Config("test".into());
        let _validation = SwitchboardError::Validation("missing scope/token".into());
        let _provider = SwitchboardError::Provider {
            message: "test".into(),
            status: Some(502),
            source: None,
        };
        let _auth = SwitchboardError::Auth("bad token".into());
        let _storage = SwitchboardError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _not_found = SwitchboardError::NotFound("call".into());
        let _channel = SwitchboardError::Channel {
            message: "test".into(),
            source: None,
        };
        let _timeout = SwitchboardError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = SwitchboardError::Internal("test".into());
    }

    #[test]
    fn ack_message_keeps_validation_text_verbatim() {
        let err = SwitchboardError::Validation("missing scope/token".into());
        assert_eq!(err.ack_message(), "missing scope/token");
        assert_eq!(
            SwitchboardError::NotFound("Account".into()).ack_message(),
            "Account not found"
        );
        assert_eq!(
            SwitchboardError::provider("telephony returned 500: boom").ack_message(),
            "telephony returned 500: boom"
        );
    }

    #[test]
    fn inbound_frame_defaults_missing_fields() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"event":"list:get"}"#).expect("should parse");
        assert_eq!(frame.event, events::LIST_GET);
        assert!(frame.id.is_none());
        assert!(frame.data.is_null());
    }

    #[test]
    fn account_status_round_trips_through_strum_and_serde() {
        use std::str::FromStr;

        for status in [
            AccountStatus::Active,
            AccountStatus::Disconnected,
            AccountStatus::Blocked,
        ] {
            let parsed = AccountStatus::from_str(&status.to_string()).expect("should parse");
            assert_eq!(parsed, status);
        }
        assert_eq!(
            serde_json::to_value(LoginMethod::Cookie).expect("serialize"),
            json!("cookie")
        );
    }

    #[test]
    fn upsert_validation_requires_identity_and_credentials() {
        assert!(upsert().validate().is_ok());

        let mut missing_key = upsert();
        missing_key.account_key = " ".into();
        assert!(matches!(
            missing_key.validate(),
            Err(SwitchboardError::Validation(_))
        ));

        let mut missing_imei = upsert();
        missing_imei.device.imei.clear();
        assert!(missing_imei.validate().is_err());

        let mut missing_credentials = upsert();
        missing_credentials.credentials = serde_json::Value::Null;
        assert!(missing_credentials.validate().is_err());
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _chat(_: &dyn ChatAggregator) {}
        fn _telephony(_: &dyn Telephony) {}
        fn _login(_: &dyn LoginSdk) {}
        fn _accounts(_: &dyn AccountStore) {}
        fn _emitter(_: &dyn Emitter) {}
    }
}
