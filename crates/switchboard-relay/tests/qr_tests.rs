// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR login sessions driven through the relay.

use std::time::Duration;

use serde_json::{Value, json};
use switchboard_core::{AccountStore, ConnectionId, LoginMethod, events};
use switchboard_relay::QrStatus;
use switchboard_test_utils::{Artifact, MockLoginSdk, RelayHarness, login_result};

/// Waits (in virtual time) until `event` has been pushed to `connection`.
async fn pushed(harness: &RelayHarness, connection: &ConnectionId, event: &str) -> Vec<Value> {
    for _ in 0..200 {
        let seen = harness.emitter.sent_to(connection, event);
        if !seen.is_empty() {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Vec::new()
}

fn login_id(ack: &Value) -> String {
    ack["loginId"].as_str().expect("loginId").to_string()
}

#[tokio::test(start_paused = true)]
async fn successful_scan_persists_account_and_cleans_artifact() {
    let harness = RelayHarness::builder()
        .with_login(MockLoginSdk::succeeding(login_result("4242")))
        .build()
        .expect("harness");
    let conn = harness.connect("c1");

    let ack = harness.send(&conn, events::QR_START, json!({})).await;
    assert_eq!(ack["ok"], true);
    let login_id = login_id(&ack);

    let ready = pushed(&harness, &conn, events::QR_READY).await;
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0]["loginId"], login_id.as_str());
    assert_eq!(
        ready[0]["qrPublicUrl"],
        format!("http://relay.test/qr/{login_id}.png")
    );

    let success = pushed(&harness, &conn, events::QR_LOGIN_SUCCESS).await;
    assert_eq!(success.len(), 1);
    assert_eq!(success[0]["profile"]["zaloId"], "4242");
    assert_eq!(success[0]["profile"]["displayName"], "Test User");
    assert_eq!(success[0]["profile"]["phone"], "0912345678");
    assert_eq!(success[0]["profile"]["phoneMasked"], "091234******8");

    let account = harness
        .accounts
        .find("4242")
        .await
        .expect("find")
        .expect("account stored");
    assert_eq!(account.device.device_name, "bot-web");
    assert_eq!(account.session.last_login_method, LoginMethod::Qr);

    let qr = harness.relay.qr().expect("qr enabled");
    assert_eq!(qr.session(&conn).map(|s| s.status), Some(QrStatus::Success));
    assert!(!harness.qr_dir.join(format!("{login_id}.png")).exists());
}

#[tokio::test(start_paused = true)]
async fn failed_login_reports_error() {
    let harness = RelayHarness::builder()
        .with_login(MockLoginSdk::failing("QR expired"))
        .build()
        .expect("harness");
    let conn = harness.connect("c1");

    let ack = harness.send(&conn, events::QR_START, json!({})).await;
    let login_id = login_id(&ack);

    let errors = pushed(&harness, &conn, events::QR_ERROR).await;
    assert_eq!(errors, vec![json!({"loginId": login_id, "error": "QR expired"})]);
    assert!(harness.accounts.is_empty().await);
    let qr = harness.relay.qr().expect("qr enabled");
    assert_eq!(qr.session(&conn).map(|s| s.status), Some(QrStatus::Failed));
}

#[tokio::test(start_paused = true)]
async fn missing_artifact_times_out() {
    let harness = RelayHarness::builder()
        .with_login(MockLoginSdk::pending().with_artifact(Artifact::Skip))
        .build()
        .expect("harness");
    let conn = harness.connect("c1");
    harness.send(&conn, events::QR_START, json!({})).await;

    let errors = pushed(&harness, &conn, events::QR_ERROR).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["error"], "QR file not created");
    assert!(harness.emitter.sent_to(&conn, events::QR_READY).is_empty());
    let qr = harness.relay.qr().expect("qr enabled");
    assert_eq!(qr.session(&conn).map(|s| s.status), Some(QrStatus::Failed));
}

#[tokio::test(start_paused = true)]
async fn late_login_failure_after_artifact_timeout_is_not_reported_twice() {
    let harness = RelayHarness::builder()
        .with_login(
            MockLoginSdk::failing("QR expired")
                .with_artifact(Artifact::Skip)
                .with_delay(Duration::from_secs(60)),
        )
        .build()
        .expect("harness");
    let conn = harness.connect("c1");
    harness.send(&conn, events::QR_START, json!({})).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    let errors = harness.emitter.sent_to(&conn, events::QR_ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["error"], "QR file not created");
}

#[tokio::test(start_paused = true)]
async fn empty_artifact_is_reported() {
    let harness = RelayHarness::builder()
        .with_login(MockLoginSdk::pending().with_artifact(Artifact::Empty))
        .build()
        .expect("harness");
    let conn = harness.connect("c1");
    harness.send(&conn, events::QR_START, json!({})).await;

    let errors = pushed(&harness, &conn, events::QR_ERROR).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["error"], "QR file is empty");
}

#[tokio::test(start_paused = true)]
async fn restart_supersedes_previous_session() {
    let harness = RelayHarness::builder()
        .with_login(MockLoginSdk::succeeding(login_result("1")).with_delay(Duration::from_secs(5)))
        .build()
        .expect("harness");
    let conn = harness.connect("c1");

    let first = login_id(&harness.send(&conn, events::QR_START, json!({})).await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = login_id(&harness.send(&conn, events::QR_START, json!({})).await);
    assert_ne!(first, second);

    let success = pushed(&harness, &conn, events::QR_LOGIN_SUCCESS).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    let success_all = harness.emitter.sent_to(&conn, events::QR_LOGIN_SUCCESS);
    assert_eq!(success.len(), 1);
    assert_eq!(success_all.len(), 1);
    assert_eq!(success_all[0]["loginId"], second.as_str());
    assert!(!harness.qr_dir.join(format!("{first}.png")).exists());
}

#[tokio::test(start_paused = true)]
async fn stop_and_disconnect_tear_down_session() {
    let harness = RelayHarness::builder()
        .with_login(MockLoginSdk::pending())
        .build()
        .expect("harness");
    let conn = harness.connect("c1");

    let ack = harness.send(&conn, events::QR_START, json!({})).await;
    let login_id = login_id(&ack);
    pushed(&harness, &conn, events::QR_READY).await;
    let artifact = harness.qr_dir.join(format!("{login_id}.png"));
    assert!(artifact.exists());

    let stop = harness.send(&conn, events::QR_STOP, json!({})).await;
    assert_eq!(stop, json!({"ok": true, "stopped": true}));
    assert!(!artifact.exists());
    let stop_again = harness.send(&conn, events::QR_STOP, json!({})).await;
    assert_eq!(stop_again, json!({"ok": true, "stopped": false}));

    harness.send(&conn, events::QR_START, json!({})).await;
    harness.relay.disconnect(&conn).await;
    let qr = harness.relay.qr().expect("qr enabled");
    assert_eq!(qr.active_sessions(), 0);
}

#[tokio::test]
async fn qr_events_fail_when_disabled() {
    let harness = RelayHarness::builder().without_qr().build().expect("harness");
    let conn = harness.connect("c1");

    let ack = harness.send(&conn, events::QR_START, json!({})).await;
    assert_eq!(ack, json!({"ok": false, "error": "QR login is disabled"}));
}
