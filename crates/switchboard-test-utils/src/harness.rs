// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay wired to in-memory fakes.
//!
//! `RelayHarness` assembles a [`Relay`] with a recording emitter, a manual
//! scheduler, mock providers and a temporary QR artifact directory, and
//! hands every piece back for assertions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use switchboard_core::{ConnectionId, SwitchboardError};
use switchboard_relay::{
    CallManager, QrLoginManager, QrSettings, Relay, WatchRegistry, WatchSettings,
};

use crate::emitter::RecordingEmitter;
use crate::manual_scheduler::ManualScheduler;
use crate::memory_accounts::InMemoryAccountStore;
use crate::mock_chat::MockChat;
use crate::mock_login::MockLoginSdk;
use crate::mock_telephony::MockTelephony;

pub struct RelayHarnessBuilder {
    telephony: MockTelephony,
    login: Option<MockLoginSdk>,
    watch_settings: WatchSettings,
    watchdog: Duration,
}

impl RelayHarnessBuilder {
    fn new() -> Self {
        Self {
            telephony: MockTelephony::new(),
            login: Some(MockLoginSdk::pending()),
            watch_settings: WatchSettings::default(),
            watchdog: Duration::from_secs(45),
        }
    }

    pub fn with_telephony(mut self, telephony: MockTelephony) -> Self {
        self.telephony = telephony;
        self
    }

    pub fn with_login(mut self, login: MockLoginSdk) -> Self {
        self.login = Some(login);
        self
    }

    /// Builds the relay with QR login turned off.
    pub fn without_qr(mut self) -> Self {
        self.login = None;
        self
    }

    pub fn with_watch_settings(mut self, settings: WatchSettings) -> Self {
        self.watch_settings = settings;
        self
    }

    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn build(self) -> Result<RelayHarness, SwitchboardError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| SwitchboardError::Storage {
            source: Box::new(e),
        })?;
        let qr_dir = temp_dir.path().join("qr");

        let emitter = Arc::new(RecordingEmitter::new());
        let chat = Arc::new(MockChat::new());
        let telephony = Arc::new(self.telephony);
        let scheduler = Arc::new(ManualScheduler::new());
        let accounts = Arc::new(InMemoryAccountStore::new());

        let watches = WatchRegistry::new(
            chat.clone(),
            emitter.clone(),
            scheduler.clone(),
            self.watch_settings,
        );
        let calls = CallManager::new(telephony.clone(), emitter.clone(), self.watchdog);

        let login = self.login.map(Arc::new);
        let qr = login.as_ref().map(|login| {
            QrLoginManager::new(
                login.clone(),
                accounts.clone(),
                emitter.clone(),
                QrSettings {
                    artifact_dir: qr_dir.clone(),
                    public_base_url: "http://relay.test".to_string(),
                    ready_poll: Duration::from_millis(200),
                    ready_attempts: 50,
                    default_user_agent: "Mozilla/5.0 (harness)".to_string(),
                },
            )
        });

        let relay = Relay::new(watches, calls, qr, accounts.clone(), emitter.clone());

        Ok(RelayHarness {
            relay,
            emitter,
            chat,
            telephony,
            scheduler,
            accounts,
            login,
            qr_dir,
            _temp_dir: temp_dir,
        })
    }
}

pub struct RelayHarness {
    pub relay: Relay,
    pub emitter: Arc<RecordingEmitter>,
    pub chat: Arc<MockChat>,
    pub telephony: Arc<MockTelephony>,
    pub scheduler: Arc<ManualScheduler>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub login: Option<Arc<MockLoginSdk>>,
    /// Where QR artifacts land.
    pub qr_dir: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl RelayHarness {
    pub fn builder() -> RelayHarnessBuilder {
        RelayHarnessBuilder::new()
    }

    /// Registers a connection with the relay and returns its id.
    pub fn connect(&self, id: &str) -> ConnectionId {
        let connection = ConnectionId::from(id);
        self.relay.connect(&connection);
        connection
    }

    pub async fn send(&self, connection: &ConnectionId, event: &str, data: Value) -> Value {
        self.relay.handle(connection, event, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn builds_with_qr_enabled() {
        let harness = RelayHarness::builder().build().expect("harness");
        assert!(harness.relay.qr().is_some());
        assert!(harness.login.is_some());
    }

    #[tokio::test]
    async fn unknown_event_is_rejected() {
        let harness = RelayHarness::builder().without_qr().build().expect("harness");
        let conn = harness.connect("c1");
        let ack = harness.send(&conn, "nope", json!({})).await;
        assert_eq!(ack, json!({"ok": false, "error": "unknown event: nope"}));
    }
}
