// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR login sessions.
//!
//! One session per connection. Starting a session spawns two tasks that
//! share a cancellation token: the artifact watcher, which tells the client
//! where the QR image is, and the login task, which waits for the scan and
//! persists the account. Both re-check that their session is still current
//! before emitting.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use strum::Display;
use switchboard_config::model::{QrConfig, ServerConfig};
use switchboard_core::{
    AccountProfile, AccountStore, AccountUpsert, ConnectionId, DeviceFingerprint, Emitter,
    LoginMethod, LoginResult, LoginSdk, SwitchboardError, events,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Device name recorded for accounts linked through QR login.
const DEVICE_NAME: &str = "bot-web";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static PHONE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\+?\d{0,3})?(\d{3})(\d{3})(\d{0,3})$").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QrStatus {
    Waiting,
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct QrSession {
    pub login_id: String,
    pub status: QrStatus,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
    cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct QrSettings {
    pub artifact_dir: PathBuf,
    pub public_base_url: String,
    pub ready_poll: Duration,
    pub ready_attempts: u32,
    pub default_user_agent: String,
}

impl QrSettings {
    pub fn from_config(qr: &QrConfig, server: &ServerConfig) -> Self {
        Self {
            artifact_dir: PathBuf::from(&qr.artifact_dir),
            public_base_url: server.public_base_url.trim_end_matches('/').to_string(),
            ready_poll: Duration::from_millis(qr.ready_poll_ms),
            ready_attempts: qr.ready_attempts,
            default_user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct QrLoginManager {
    sdk: Arc<dyn LoginSdk>,
    accounts: Arc<dyn AccountStore>,
    emitter: Arc<dyn Emitter>,
    settings: QrSettings,
    sessions: DashMap<ConnectionId, QrSession>,
}

impl QrLoginManager {
    pub fn new(
        sdk: Arc<dyn LoginSdk>,
        accounts: Arc<dyn AccountStore>,
        emitter: Arc<dyn Emitter>,
        settings: QrSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            sdk,
            accounts,
            emitter,
            settings,
            sessions: DashMap::new(),
        })
    }

    /// Replaces the connection's session with a fresh one and returns its login id.
    pub async fn start_session(
        self: &Arc<Self>,
        connection: &ConnectionId,
        user_agent: Option<String>,
    ) -> Result<String, SwitchboardError> {
        self.stop_session(connection).await;

        tokio::fs::create_dir_all(&self.settings.artifact_dir)
            .await
            .map_err(|e| SwitchboardError::Internal(format!("cannot create QR directory: {e}")))?;

        let login_id = uuid::Uuid::new_v4().to_string();
        let file_path = self.settings.artifact_dir.join(format!("{login_id}.png"));
        let cancel = CancellationToken::new();
        let session = QrSession {
            login_id: login_id.clone(),
            status: QrStatus::Waiting,
            file_path: file_path.clone(),
            created_at: Utc::now(),
            cancel: cancel.clone(),
        };

        // A concurrent start may have slipped in between stop and insert.
        if let Some(displaced) = self.sessions.insert(connection.clone(), session) {
            displaced.cancel.cancel();
            remove_artifact(&displaced.file_path).await;
        }
        info!(connection_id = %connection, login_id = %login_id, "QR session started");

        let user_agent = user_agent
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_user_agent.clone());

        tokio::spawn(Arc::clone(self).watch_artifact(
            connection.clone(),
            login_id.clone(),
            file_path.clone(),
            cancel.clone(),
        ));
        tokio::spawn(Arc::clone(self).run_login(
            connection.clone(),
            login_id.clone(),
            file_path,
            user_agent,
            cancel,
        ));

        Ok(login_id)
    }

    /// Cancels the connection's session and deletes its artifact.
    pub async fn stop_session(&self, connection: &ConnectionId) -> bool {
        let Some((_, session)) = self.sessions.remove(connection) else {
            return false;
        };
        session.cancel.cancel();
        remove_artifact(&session.file_path).await;
        debug!(connection_id = %connection, login_id = %session.login_id, "QR session stopped");
        true
    }

    /// The login SDK, shared with account status checks.
    pub fn sdk(&self) -> &Arc<dyn LoginSdk> {
        &self.sdk
    }

    pub fn session(&self, connection: &ConnectionId) -> Option<QrSession> {
        self.sessions.get(connection).map(|s| s.clone())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    async fn watch_artifact(
        self: Arc<Self>,
        connection: ConnectionId,
        login_id: String,
        path: PathBuf,
        cancel: CancellationToken,
    ) {
        let mut last = ArtifactState::Missing;
        for _ in 0..self.settings.ready_attempts {
            last = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                state = artifact_state(&path) => state,
            };
            if last == ArtifactState::Ready {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.settings.ready_poll) => {}
            }
        }

        let (event, payload) = match last {
            ArtifactState::Ready => (
                events::QR_READY,
                json!({
                    "ok": true,
                    "loginId": login_id,
                    "qrPublicUrl": format!("{}/qr/{login_id}.png", self.settings.public_base_url),
                }),
            ),
            ArtifactState::Empty => (
                events::QR_ERROR,
                json!({"loginId": login_id, "error": "QR file is empty"}),
            ),
            ArtifactState::Missing => (
                events::QR_ERROR,
                json!({"loginId": login_id, "error": "QR file not created"}),
            ),
        };

        let ready = last == ArtifactState::Ready;
        let emitted = self.with_waiting_session(&connection, &login_id, |session| {
            if !ready {
                session.status = QrStatus::Failed;
            }
            self.emitter.emit_to(&connection, event, payload);
        });
        if emitted && !ready {
            warn!(connection_id = %connection, login_id = %login_id, "QR artifact not ready");
        }
    }

    async fn run_login(
        self: Arc<Self>,
        connection: ConnectionId,
        login_id: String,
        path: PathBuf,
        user_agent: String,
        cancel: CancellationToken,
    ) {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            outcome = self.sdk.login_qr(&path, &user_agent) => outcome,
        };

        let login = match outcome {
            Ok(login) => login,
            Err(e) => {
                warn!(connection_id = %connection, login_id = %login_id, error = %e, "QR login failed");
                self.with_waiting_session(&connection, &login_id, |session| {
                    session.status = QrStatus::Failed;
                    self.emitter.emit_to(
                        &connection,
                        events::QR_ERROR,
                        json!({"loginId": login_id, "error": e.ack_message()}),
                    );
                });
                return;
            }
        };
        if cancel.is_cancelled() {
            return;
        }

        let profile = normalize_profile(&login.own_id, login.account_info.as_ref());
        let phone = profile_phone(login.account_info.as_ref());
        let upsert = account_upsert(&login, profile.clone());
        if let Err(e) = self.accounts.upsert(upsert).await {
            warn!(login_id = %login_id, error = %e, "failed to persist QR account");
        }
        if cancel.is_cancelled() {
            return;
        }

        let emitted = self.with_waiting_session(&connection, &login_id, |session| {
            session.status = QrStatus::Success;
            self.emitter.emit_to(
                &connection,
                events::QR_LOGIN_SUCCESS,
                json!({
                    "loginId": login_id,
                    "profile": {
                        "zaloId": profile.zalo_id,
                        "displayName": profile.display_name,
                        "avatar": profile.avatar,
                        "phone": phone,
                        "phoneMasked": profile.phone_masked,
                    },
                }),
            );
        });
        if emitted {
            info!(connection_id = %connection, login_id = %login_id, zalo_id = %login.own_id, "QR login succeeded");
            remove_artifact(&path).await;
        }
    }

    /// Runs `f` on the session only if it is still `login_id` and waiting.
    fn with_waiting_session(
        &self,
        connection: &ConnectionId,
        login_id: &str,
        f: impl FnOnce(&mut QrSession),
    ) -> bool {
        match self.sessions.get_mut(connection) {
            Some(mut session)
                if session.login_id == login_id
                    && session.status == QrStatus::Waiting
                    && !session.cancel.is_cancelled() =>
            {
                f(session.value_mut());
                true
            }
            _ => {
                debug!(connection_id = %connection, login_id, "ignoring result of stale QR session");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactState {
    Missing,
    Empty,
    Ready,
}

async fn artifact_state(path: &Path) -> ArtifactState {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => ArtifactState::Ready,
        Ok(_) => ArtifactState::Empty,
        Err(_) => ArtifactState::Missing,
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "failed to remove QR artifact"),
    }
}

fn account_upsert(login: &LoginResult, profile: AccountProfile) -> AccountUpsert {
    AccountUpsert {
        account_key: login.own_id.clone(),
        profile,
        device: DeviceFingerprint {
            imei: login.imei.clone(),
            user_agent: login.user_agent.clone(),
            device_name: DEVICE_NAME.to_string(),
        },
        credentials: login.credentials.clone(),
        login_method: LoginMethod::Qr,
    }
}

/// The profile object inside account info, which may or may not be nested
/// under `profile`.
fn profile_data(account_info: Option<&Value>) -> &Value {
    static EMPTY: Value = Value::Null;
    let info = account_info.unwrap_or(&EMPTY);
    info.get("profile").filter(|p| p.is_object()).unwrap_or(info)
}

/// The unmasked phone number from account info, or an empty string.
pub fn profile_phone(account_info: Option<&Value>) -> String {
    let data = profile_data(account_info);
    ["phoneNumber", "phone"]
        .iter()
        .find_map(|field| match data.get(*field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Builds a display profile from whatever shape of account info the SDK returned.
///
/// Never fails: every field has a fallback.
pub fn normalize_profile(own_id: &str, account_info: Option<&Value>) -> AccountProfile {
    let data = profile_data(account_info);

    let text = |field: &str| {
        data.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let display_name = text("displayName")
        .or_else(|| text("zaloName"))
        .or_else(|| text("name"))
        .unwrap_or(own_id)
        .to_string();
    let avatar = text("avatar")
        .or_else(|| text("avatarUrl"))
        .unwrap_or_default()
        .to_string();
    let phone = profile_phone(account_info);

    AccountProfile {
        zalo_id: own_id.to_string(),
        display_name,
        avatar,
        phone_masked: mask_phone(&phone),
    }
}

/// Masks the middle digits of a phone number; unrecognized input is returned as is.
pub fn mask_phone(phone: &str) -> String {
    let Some(caps) = PHONE_PATTERN.as_ref().and_then(|re| re.captures(phone)) else {
        return phone.to_string();
    };
    let group = |i| caps.get(i).map_or("", |m| m.as_str());
    let tail = match group(4) {
        "" => "***".to_string(),
        last => format!("***{last}"),
    };
    format!("{}{}***{tail}", group(1), group(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_phone_hides_middle_digits() {
        assert_eq!(mask_phone("0912345678"), "091234******8");
        assert_eq!(mask_phone("+84912345678"), "+84912******678");
        assert_eq!(mask_phone("123456"), "123******");
    }

    #[test]
    fn mask_phone_leaves_garbage_alone() {
        assert_eq!(mask_phone("not a phone"), "not a phone");
        assert_eq!(mask_phone(""), "");
    }

    #[test]
    fn normalize_prefers_nested_profile() {
        let info = json!({
            "profile": {"zaloName": "Zed", "avatarUrl": "https://img/a.png", "phoneNumber": "+84912345678"}
        });
        let profile = normalize_profile("42", Some(&info));
        assert_eq!(profile.zalo_id, "42");
        assert_eq!(profile.display_name, "Zed");
        assert_eq!(profile.avatar, "https://img/a.png");
        assert!(profile.phone_masked.contains("***"));
    }

    #[test]
    fn normalize_falls_back_to_own_id() {
        let profile = normalize_profile("42", None);
        assert_eq!(profile.display_name, "42");
        assert_eq!(profile.avatar, "");
        assert_eq!(profile.phone_masked, "");
    }

    #[test]
    fn normalize_accepts_numeric_phone() {
        let info = json!({"displayName": "Ann", "phone": 912345678});
        let profile = normalize_profile("1", Some(&info));
        assert_eq!(profile.display_name, "Ann");
        assert_eq!(profile.phone_masked, mask_phone("912345678"));
        assert_eq!(profile_phone(Some(&info)), "912345678");
    }

    #[test]
    fn profile_phone_reads_nested_profile_unmasked() {
        let info = json!({"profile": {"phoneNumber": "0912345678"}, "phone": "ignored"});
        assert_eq!(profile_phone(Some(&info)), "0912345678");
        assert_eq!(profile_phone(None), "");
    }

    #[test]
    fn settings_trim_public_base() {
        let server = ServerConfig {
            public_base_url: "https://relay.example/".into(),
            ..ServerConfig::default()
        };
        let settings = QrSettings::from_config(&QrConfig::default(), &server);
        assert_eq!(settings.public_base_url, "https://relay.example");
        assert_eq!(settings.ready_attempts, 50);
        assert_eq!(settings.ready_poll, Duration::from_millis(200));
    }
}
