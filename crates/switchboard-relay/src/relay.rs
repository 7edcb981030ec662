// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event dispatch for one real-time connection.
//!
//! [`Relay::handle`] validates an inbound event, routes it to the watch,
//! call, QR or account component, and returns the acknowledgement body.
//! Failures are folded into `{ok:false, error}` so the transport never has
//! to inspect error types.

use std::sync::Arc;
use std::time::Duration;

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use switchboard_core::{
    AccountStore, AccountSummary, ConnectionId, Emitter, ListQuery, MessageQuery,
    SwitchboardError, events,
};
use tracing::{debug, info, warn};

use crate::accounts::refresh_account_statuses;
use crate::calls::{CallManager, EndReason, call_group};
use crate::qr::QrLoginManager;
use crate::watch::{WatchKey, WatchRegistry, list_patch};

type HandlerResult = Result<Value, SwitchboardError>;

/// Accepts a string or a number; anything else reads as absent.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a non-negative number or a numeric string; anything else reads as zero.
fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// An event body read leniently from client JSON.
trait Payload: DeserializeOwned + Default {
    /// `(legacy, current)` field names. The legacy value is used only when
    /// the current one is absent or blank.
    const LEGACY_KEYS: &'static [(&'static str, &'static str)] = &[];
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListPayload {
    #[serde(deserialize_with = "lenient_text")]
    scope: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    token: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    resume_count: u64,
    #[serde(deserialize_with = "lenient_text")]
    query: Option<String>,
}

impl Payload for ListPayload {
    const LEGACY_KEYS: &'static [(&'static str, &'static str)] = &[
        ("pageId", "scope"),
        ("access_token", "token"),
        ("current_count", "resumeCount"),
        ("q", "query"),
    ];
}

impl ListPayload {
    fn list_query(&self, missing: &str) -> Result<ListQuery, SwitchboardError> {
        match (&self.scope, &self.token) {
            (Some(scope), Some(token)) => Ok(ListQuery {
                scope: scope.clone(),
                token: token.clone(),
                resume_count: self.resume_count,
            }),
            _ => Err(SwitchboardError::Validation(missing.into())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ItemPayload {
    #[serde(deserialize_with = "lenient_text")]
    scope: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    token: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    item_key: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    owner_key: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    count: u64,
    #[serde(deserialize_with = "lenient_count")]
    interval_ms: u64,
}

impl Payload for ItemPayload {
    const LEGACY_KEYS: &'static [(&'static str, &'static str)] = &[
        ("pageId", "scope"),
        ("access_token", "token"),
        ("conversationId", "itemKey"),
        ("customerId", "ownerKey"),
    ];
}

impl ItemPayload {
    fn message_query(&self) -> Result<MessageQuery, SwitchboardError> {
        match (&self.scope, &self.token, &self.item_key) {
            (Some(scope), Some(token), Some(item_key)) => Ok(MessageQuery {
                scope: scope.clone(),
                token: token.clone(),
                item_key: item_key.clone(),
                owner_key: self.owner_key.clone(),
                count: self.count,
            }),
            _ => Err(SwitchboardError::Validation(
                "missing scope/token/itemKey".into(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CallPayload {
    #[serde(deserialize_with = "lenient_text")]
    phone_number: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    customer_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    call_id: Option<String>,
}

impl Payload for CallPayload {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QrPayload {
    #[serde(deserialize_with = "lenient_text")]
    user_agent: Option<String>,
}

impl Payload for QrPayload {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AccountPayload {
    #[serde(deserialize_with = "lenient_text")]
    account_key: Option<String>,
}

impl Payload for AccountPayload {}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Folds legacy field names into their current names so a body carrying
/// both never trips serde's duplicate-field check.
fn resolve_legacy_keys(fields: &mut Map<String, Value>, legacy_keys: &[(&str, &str)]) {
    for (legacy, current) in legacy_keys {
        let Some(value) = fields.remove(*legacy) else {
            continue;
        };
        if fields.get(*current).is_none_or(is_blank) {
            fields.insert((*current).to_string(), value);
        }
    }
}

/// Reads `data` as `T`. `null` and non-object payloads become `T::default()`.
fn payload<T: Payload>(data: Value) -> T {
    let Value::Object(mut fields) = data else {
        return T::default();
    };
    resolve_legacy_keys(&mut fields, T::LEGACY_KEYS);
    serde_json::from_value(Value::Object(fields)).unwrap_or_else(|e| {
        warn!(error = %e, "unreadable event payload; using defaults");
        T::default()
    })
}

fn missing(message: &str) -> SwitchboardError {
    SwitchboardError::Validation(message.into())
}

fn failure(error: &SwitchboardError) -> Value {
    json!({"ok": false, "error": error.ack_message()})
}

/// Routes client events to the relay components.
pub struct Relay {
    watches: Arc<WatchRegistry>,
    calls: Arc<CallManager>,
    qr: Option<Arc<QrLoginManager>>,
    accounts: Arc<dyn AccountStore>,
    emitter: Arc<dyn Emitter>,
}

impl Relay {
    pub fn new(
        watches: Arc<WatchRegistry>,
        calls: Arc<CallManager>,
        qr: Option<Arc<QrLoginManager>>,
        accounts: Arc<dyn AccountStore>,
        emitter: Arc<dyn Emitter>,
    ) -> Self {
        Self {
            watches,
            calls,
            qr,
            accounts,
            emitter,
        }
    }

    pub fn watches(&self) -> &Arc<WatchRegistry> {
        &self.watches
    }

    pub fn calls(&self) -> &Arc<CallManager> {
        &self.calls
    }

    pub fn qr(&self) -> Option<&Arc<QrLoginManager>> {
        self.qr.as_ref()
    }

    /// Registers a new connection so watches can be armed for it.
    pub fn connect(&self, connection: &ConnectionId) {
        self.watches.open_connection(connection);
        debug!(connection_id = %connection, "connection registered");
    }

    /// Handles one inbound event and returns its acknowledgement body.
    pub async fn handle(&self, connection: &ConnectionId, event: &str, data: Value) -> Value {
        debug!(connection_id = %connection, event, "inbound event");
        let result = match event {
            events::LIST_GET => self.list_get(connection, payload(data)).await,
            events::LIST_LOAD_MORE => self.list_load_more(connection, payload(data)).await,
            events::LIST_SEARCH => self.list_search(payload(data)).await,
            events::ITEM_GET => self.item_get(payload(data)).await,
            events::ITEM_WATCH_START => self.item_watch_start(connection, payload(data)).await,
            events::ITEM_WATCH_STOP => self.item_watch_stop(connection, payload(data)),
            events::CALL_START => self.call_start(connection, payload(data)),
            events::CALL_END => self.call_end(connection, payload(data)).await,
            events::CALL_SYNC => self.call_sync(connection, payload(data)),
            events::QR_START => self.qr_start(connection, payload(data)).await,
            events::QR_STOP => self.qr_stop(connection).await,
            events::ACCOUNTS_LIST => self.accounts_list().await,
            events::ACCOUNTS_DELETE => self.accounts_delete(payload(data)).await,
            events::ACCOUNTS_REFRESH_STATUS => self.accounts_refresh_status().await,
            other => Err(SwitchboardError::Validation(format!("unknown event: {other}"))),
        };

        result.unwrap_or_else(|e| {
            debug!(connection_id = %connection, event, error = %e, "event failed");
            failure(&e)
        })
    }

    /// Releases everything the connection owned: watches, calls, and its QR session.
    pub async fn disconnect(&self, connection: &ConnectionId) {
        let watches = self.watches.disconnect_cleanup(connection);
        let calls = self.calls.disconnect(connection).await;
        let qr = match &self.qr {
            Some(qr) => qr.stop_session(connection).await,
            None => false,
        };
        info!(connection_id = %connection, watches, calls, qr, "connection cleaned up");
    }

    async fn list_get(&self, connection: &ConnectionId, payload: ListPayload) -> HandlerResult {
        let query = payload.list_query("missing scope/token")?;
        let interval = self.watches.settings().list_interval;
        let items = self
            .watches
            .start_list_watch(connection, query, interval)
            .await?;
        Ok(json!({"ok": true, "items": items}))
    }

    async fn list_load_more(
        &self,
        connection: &ConnectionId,
        payload: ListPayload,
    ) -> HandlerResult {
        let query = payload.list_query("missing params")?;
        if query.resume_count == 0 {
            return Err(missing("missing params"));
        }
        let scope = query.scope.clone();
        let interval = self.watches.settings().list_interval;
        let items = self
            .watches
            .start_list_watch(connection, query, interval)
            .await?;
        self.emitter
            .emit_to(connection, events::LIST_PATCH, list_patch(&scope, items.clone()));
        Ok(json!({"ok": true, "items": items}))
    }

    async fn list_search(&self, payload: ListPayload) -> HandlerResult {
        let query = payload.list_query("missing scope/token/query")?;
        let text = payload
            .query
            .ok_or_else(|| missing("missing scope/token/query"))?;
        let items = self
            .watches
            .chat()
            .search_conversations(&query.scope, &query.token, &text)
            .await?;
        Ok(json!({"ok": true, "items": items}))
    }

    async fn item_get(&self, payload: ItemPayload) -> HandlerResult {
        let mut query = payload.message_query()?;
        query.item_key =
            switchboard_core::canonical_conversation_key(&query.item_key).to_string();
        let items = self.watches.chat().fetch_messages(&query).await?;
        Ok(json!({"ok": true, "items": items}))
    }

    async fn item_watch_start(
        &self,
        connection: &ConnectionId,
        payload: ItemPayload,
    ) -> HandlerResult {
        let query = payload.message_query()?;
        let interval = Some(Duration::from_millis(payload.interval_ms));
        self.watches
            .start_message_watch(connection, query, interval)
            .await?;
        Ok(json!({"ok": true}))
    }

    fn item_watch_stop(&self, connection: &ConnectionId, payload: ItemPayload) -> HandlerResult {
        let (Some(scope), Some(item_key)) = (&payload.scope, &payload.item_key) else {
            return Err(missing("missing scope/itemKey"));
        };
        self.watches
            .stop_watch(&WatchKey::messages(connection, scope, item_key));
        Ok(json!({"ok": true, "stopped": true}))
    }

    fn call_start(&self, connection: &ConnectionId, payload: CallPayload) -> HandlerResult {
        let Some(phone_number) = payload.phone_number else {
            let error = missing("missing phoneNumber");
            self.emitter.emit_to(
                connection,
                events::CALL_ERROR,
                json!({"message": error.ack_message()}),
            );
            return Err(error);
        };
        let call_id = self
            .calls
            .start_call(Some(connection), &phone_number, payload.customer_id);
        Ok(json!({"ok": true, "callId": call_id}))
    }

    async fn call_end(&self, connection: &ConnectionId, payload: CallPayload) -> HandlerResult {
        let call_id = payload.call_id.ok_or_else(|| missing("missing callId"))?;
        let ended = self
            .calls
            .end_call(
                &call_id,
                EndReason::Manual {
                    by: connection.clone(),
                },
            )
            .await;
        self.emitter.leave_group(connection, &call_group(&call_id));
        Ok(json!({"ok": true, "ended": ended}))
    }

    fn call_sync(&self, connection: &ConnectionId, payload: CallPayload) -> HandlerResult {
        let call_id = payload.call_id.ok_or_else(|| missing("missing callId"))?;
        let (event, body) = match self.calls.get_call(&call_id) {
            Some(record) => (events::CALL_STATUS, record.status_payload()),
            None => (
                events::CALL_ENDED,
                json!({"callId": call_id, "reason": "not_found"}),
            ),
        };
        self.emitter.emit_to(connection, event, body.clone());
        Ok(body)
    }

    async fn qr_start(&self, connection: &ConnectionId, payload: QrPayload) -> HandlerResult {
        let qr = self.qr_manager()?;
        let login_id = qr.start_session(connection, payload.user_agent).await?;
        Ok(json!({"ok": true, "loginId": login_id}))
    }

    async fn qr_stop(&self, connection: &ConnectionId) -> HandlerResult {
        let qr = self.qr_manager()?;
        let stopped = qr.stop_session(connection).await;
        Ok(json!({"ok": true, "stopped": stopped}))
    }

    fn qr_manager(&self) -> Result<&Arc<QrLoginManager>, SwitchboardError> {
        self.qr
            .as_ref()
            .ok_or_else(|| SwitchboardError::Validation("QR login is disabled".into()))
    }

    async fn accounts_list(&self) -> HandlerResult {
        let accounts: Vec<AccountSummary> =
            self.accounts.list().await?.iter().map(AccountSummary::from).collect();
        let total = accounts.len();
        Ok(json!({"ok": true, "accounts": accounts, "totalCount": total}))
    }

    async fn accounts_refresh_status(&self) -> HandlerResult {
        let qr = self.qr.as_ref().ok_or_else(|| {
            SwitchboardError::Validation("login bridge is not configured".into())
        })?;
        let results = refresh_account_statuses(qr.sdk().as_ref(), self.accounts.as_ref()).await?;
        Ok(json!({"ok": true, "results": results}))
    }

    async fn accounts_delete(&self, payload: AccountPayload) -> HandlerResult {
        let key = payload
            .account_key
            .ok_or_else(|| missing("missing accountKey"))?;
        if self.accounts.delete(&key).await? {
            info!(account_key = %key, "account deleted");
            Ok(json!({"ok": true}))
        } else {
            Err(missing("Account not found"))
        }
    }
}
