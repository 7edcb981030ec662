// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock QR login SDK.
//!
//! Writes (or withholds) the QR artifact, waits, then resolves with a
//! scripted outcome. With no outcome it never resolves, like a QR nobody scans.
//! Cookie logins answer from a per-account table; unknown accounts are
//! rejected as expired sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_core::{LoginResult, LoginSdk, SwitchboardError};
use tokio::sync::Mutex;

/// Smallest valid PNG signature; enough for a non-empty artifact.
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Write,
    Empty,
    Skip,
}

#[derive(Debug)]
pub struct MockLoginSdk {
    artifact: Artifact,
    delay: Duration,
    outcome: Option<Result<LoginResult, String>>,
    paths: Mutex<Vec<PathBuf>>,
    calls: AtomicUsize,
    sessions: HashMap<String, Result<Option<Value>, String>>,
}

/// A plausible login result for `own_id`.
pub fn login_result(own_id: &str) -> LoginResult {
    LoginResult {
        own_id: own_id.to_string(),
        account_info: Some(json!({
            "profile": {"displayName": "Test User", "avatar": "https://img/t.png", "phoneNumber": "0912345678"}
        })),
        imei: "imei-test".to_string(),
        user_agent: "Mozilla/5.0 (test)".to_string(),
        credentials: json!([{"key": "zpw_sek", "value": "secret"}]),
    }
}

impl MockLoginSdk {
    fn with_outcome(outcome: Option<Result<LoginResult, String>>) -> Self {
        Self {
            artifact: Artifact::Write,
            delay: Duration::from_secs(1),
            outcome,
            paths: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            sessions: HashMap::new(),
        }
    }

    pub fn succeeding(result: LoginResult) -> Self {
        Self::with_outcome(Some(Ok(result)))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_outcome(Some(Err(message.to_string())))
    }

    /// Never completes.
    pub fn pending() -> Self {
        Self::with_outcome(None)
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = artifact;
        self
    }

    /// Time between writing the artifact and resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cookie login for `own_id` succeeds and returns `user_info`.
    pub fn with_user_info(mut self, own_id: &str, user_info: Option<Value>) -> Self {
        self.sessions.insert(own_id.to_string(), Ok(user_info));
        self
    }

    /// Cookie login for `own_id` fails with `message`.
    pub fn with_rejected_session(mut self, own_id: &str, message: &str) -> Self {
        self.sessions
            .insert(own_id.to_string(), Err(message.to_string()));
        self
    }

    pub async fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginSdk for MockLoginSdk {
    async fn login_qr(
        &self,
        qr_path: &Path,
        _user_agent: &str,
    ) -> Result<LoginResult, SwitchboardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().await.push(qr_path.to_path_buf());

        let bytes: &[u8] = match self.artifact {
            Artifact::Write => PNG_BYTES,
            Artifact::Empty => &[],
            Artifact::Skip => return self.resolve().await,
        };
        tokio::fs::write(qr_path, bytes)
            .await
            .map_err(|e| SwitchboardError::Internal(e.to_string()))?;
        self.resolve().await
    }

    async fn login_cookie(
        &self,
        own_id: &str,
        _credentials: &Value,
        _imei: &str,
        _user_agent: &str,
    ) -> Result<Option<Value>, SwitchboardError> {
        match self.sessions.get(own_id) {
            Some(Ok(info)) => Ok(info.clone()),
            Some(Err(message)) => Err(SwitchboardError::provider(message.clone())),
            None => Err(SwitchboardError::provider("session expired")),
        }
    }
}

impl MockLoginSdk {
    async fn resolve(&self) -> Result<LoginResult, SwitchboardError> {
        tokio::time::sleep(self.delay).await;
        match &self.outcome {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(SwitchboardError::provider(message.clone())),
            None => std::future::pending().await,
        }
    }
}
