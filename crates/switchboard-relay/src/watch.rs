// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection polling watches.
//!
//! The registry owns every timer that re-fetches a conversation list or a
//! conversation's messages on behalf of a connection. A key has at most one
//! live timer: arming removes and cancels the previous entry inside the same
//! per-connection lock before the new timer is inserted.
//!
//! Each entry carries a generation number. A start registers its entry as
//! pending before the initial fetch and arms the timer only if that same
//! generation is still pending afterwards, so a stop that lands during the
//! fetch wins. Tick results are emitted only while the entry with that
//! generation is still registered, checked under the same lock, so a fetch
//! that was in flight when the watch stopped is discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::{Map, Value, json};
use strum::Display;
use switchboard_config::model::PollConfig;
use switchboard_core::conversation::canonical_conversation_key;
use switchboard_core::{
    ChatAggregator, ConnectionId, Emitter, ListQuery, MessageQuery, SwitchboardError, events,
};
use tracing::{debug, warn};

use crate::scheduler::{Scheduler, Tick, TimerHandle};

/// Resource id used for the single list watch of a connection.
const LIST_RESOURCE: &str = "*";

/// Maximum characters of message text copied into a synthetic list patch.
const SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "camelCase")]
pub enum ResourceScope {
    ConversationList,
    ConversationMessages,
}

/// Identity of one watch: `(connection, scope, resource)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    connection: ConnectionId,
    scope: ResourceScope,
    resource: String,
}

impl WatchKey {
    /// The conversation list watch of a connection.
    pub fn list(connection: &ConnectionId) -> Self {
        Self {
            connection: connection.clone(),
            scope: ResourceScope::ConversationList,
            resource: LIST_RESOURCE.to_string(),
        }
    }

    /// The message watch of one conversation on a page.
    ///
    /// `item_key` may be bare, composite, or platform-prefixed.
    pub fn messages(connection: &ConnectionId, page: &str, item_key: &str) -> Self {
        Self {
            connection: connection.clone(),
            scope: ResourceScope::ConversationMessages,
            resource: format!("{page}|{}", canonical_conversation_key(item_key)),
        }
    }

    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }

    pub fn scope(&self) -> ResourceScope {
        self.scope
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.connection, self.scope, self.resource)
    }
}

/// What a watch fetches on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchParams {
    List(ListQuery),
    Messages(MessageQuery),
}

#[derive(Debug)]
struct WatchEntry {
    /// `None` while the initial fetch is still running.
    handle: Option<TimerHandle>,
    interval: Duration,
    params: WatchParams,
    generation: u64,
}

/// Interval settings for watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub list_interval: Duration,
    pub message_interval: Duration,
    pub min_message_interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for WatchSettings {
    fn from(config: &PollConfig) -> Self {
        Self {
            list_interval: Duration::from_millis(config.list_interval_ms),
            message_interval: Duration::from_millis(config.message_interval_ms),
            min_message_interval: Duration::from_millis(config.min_message_interval_ms),
        }
    }
}

/// Registry of active watches, keyed by connection.
pub struct WatchRegistry {
    chat: Arc<dyn ChatAggregator>,
    emitter: Arc<dyn Emitter>,
    scheduler: Arc<dyn Scheduler>,
    settings: WatchSettings,
    connections: DashMap<ConnectionId, HashMap<WatchKey, WatchEntry>>,
    next_generation: AtomicU64,
}

impl WatchRegistry {
    pub fn new(
        chat: Arc<dyn ChatAggregator>,
        emitter: Arc<dyn Emitter>,
        scheduler: Arc<dyn Scheduler>,
        settings: WatchSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            chat,
            emitter,
            scheduler,
            settings,
            connections: DashMap::new(),
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    /// The aggregator used for watch fetches, also used for one-shot reads.
    pub fn chat(&self) -> &Arc<dyn ChatAggregator> {
        &self.chat
    }

    /// Registers a live connection. Watches can only be armed for live connections.
    pub fn open_connection(&self, connection: &ConnectionId) {
        self.connections.entry(connection.clone()).or_default();
    }

    /// Replaces the connection's list watch.
    ///
    /// Returns the first page right away. If that fetch fails the error is
    /// returned and no timer is armed.
    pub async fn start_list_watch(
        self: &Arc<Self>,
        connection: &ConnectionId,
        query: ListQuery,
        interval: Duration,
    ) -> Result<Vec<Value>, SwitchboardError> {
        let key = WatchKey::list(connection);
        let params = WatchParams::List(query.clone());
        let generation = self.reserve(&key, interval, params.clone());

        match self.chat.list_conversations(&query).await {
            Ok(items) => {
                if let Some(generation) = generation {
                    self.arm(key, generation, interval, params);
                }
                Ok(items)
            }
            Err(e) => {
                if let Some(generation) = generation {
                    self.release(&key, generation);
                }
                Err(e)
            }
        }
    }

    /// Replaces the message watch for one conversation.
    ///
    /// `query.item_key` is normalized first. The initial fetch honours
    /// `query.count`; ticks always fetch the latest window. `interval` is
    /// clamped to the configured floor, and `None` selects the default.
    pub async fn start_message_watch(
        self: &Arc<Self>,
        connection: &ConnectionId,
        mut query: MessageQuery,
        interval: Option<Duration>,
    ) -> Result<Vec<Value>, SwitchboardError> {
        query.item_key = canonical_conversation_key(&query.item_key).to_string();
        let key = WatchKey::messages(connection, &query.scope, &query.item_key);
        let interval = self.message_interval(interval);
        let params = WatchParams::Messages(query.clone());
        let generation = self.reserve(&key, interval, params.clone());

        match self.chat.fetch_messages(&query).await {
            Ok(items) => {
                if let Some(generation) = generation {
                    self.arm(key, generation, interval, params);
                }
                Ok(items)
            }
            Err(e) => {
                if let Some(generation) = generation {
                    self.release(&key, generation);
                }
                Err(e)
            }
        }
    }

    /// Effective message watch interval for a requested value.
    pub fn message_interval(&self, requested: Option<Duration>) -> Duration {
        requested
            .filter(|d| !d.is_zero())
            .unwrap_or(self.settings.message_interval)
            .max(self.settings.min_message_interval)
    }

    /// Cancels and removes the watch, including one whose start is still
    /// fetching. Returns `false` if there was none.
    pub fn stop_watch(&self, key: &WatchKey) -> bool {
        let removed = self
            .connections
            .get_mut(&key.connection)
            .and_then(|mut watches| watches.remove(key));
        match removed {
            Some(entry) => {
                self.cancel_entry(&entry);
                debug!(watch_key = %key, "watch stopped");
                true
            }
            None => false,
        }
    }

    /// Cancels every watch of the connection and forgets it.
    ///
    /// Returns the number of watches removed. Later `start_*` calls for the
    /// same id will not arm timers until it is opened again.
    pub fn disconnect_cleanup(&self, connection: &ConnectionId) -> usize {
        let Some((_, watches)) = self.connections.remove(connection) else {
            return 0;
        };
        for entry in watches.values() {
            self.cancel_entry(entry);
        }
        if !watches.is_empty() {
            debug!(connection_id = %connection, count = watches.len(), "watches cleaned up");
        }
        watches.len()
    }

    pub fn watch_count(&self, connection: &ConnectionId) -> usize {
        self.connections
            .get(connection)
            .map_or(0, |watches| watches.len())
    }

    pub fn total_watches(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_watching(&self, key: &WatchKey) -> bool {
        self.connections
            .get(&key.connection)
            .is_some_and(|watches| watches.contains_key(key))
    }

    /// Interval and parameters of a live watch.
    pub fn describe(&self, key: &WatchKey) -> Option<(Duration, WatchParams)> {
        let watches = self.connections.get(&key.connection)?;
        let entry = watches.get(key)?;
        Some((entry.interval, entry.params.clone()))
    }

    /// Replaces any entry for `key` with a pending one and returns its
    /// generation, or `None` if the connection is not open.
    fn reserve(&self, key: &WatchKey, interval: Duration, params: WatchParams) -> Option<u64> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let Some(mut watches) = self.connections.get_mut(&key.connection) else {
            debug!(watch_key = %key, "connection closed before watch could be armed");
            return None;
        };
        let previous = watches.insert(
            key.clone(),
            WatchEntry {
                handle: None,
                interval,
                params,
                generation,
            },
        );
        if let Some(previous) = previous {
            self.cancel_entry(&previous);
        }
        Some(generation)
    }

    /// Drops the pending entry of a start whose initial fetch failed.
    fn release(&self, key: &WatchKey, generation: u64) {
        if let Some(mut watches) = self.connections.get_mut(&key.connection) {
            if watches
                .get(key)
                .is_some_and(|entry| entry.generation == generation)
            {
                watches.remove(key);
            }
        }
    }

    /// Starts the timer for a pending entry. Refused when the entry was
    /// stopped, replaced or cleaned up while the initial fetch ran.
    fn arm(
        self: &Arc<Self>,
        key: WatchKey,
        generation: u64,
        interval: Duration,
        params: WatchParams,
    ) -> bool {
        let Some(mut watches) = self.connections.get_mut(&key.connection) else {
            debug!(watch_key = %key, "connection closed before watch could be armed");
            return false;
        };
        let Some(entry) = watches
            .get_mut(&key)
            .filter(|entry| entry.generation == generation && entry.handle.is_none())
        else {
            debug!(watch_key = %key, generation, "watch stopped before it was armed");
            return false;
        };

        let tick = self.tick_fn(key.clone(), generation, params);
        entry.handle = Some(self.scheduler.arm(&key.to_string(), interval, tick));
        debug!(watch_key = %key, interval_ms = interval.as_millis() as u64, "watch armed");
        true
    }

    fn cancel_entry(&self, entry: &WatchEntry) {
        if let Some(handle) = &entry.handle {
            self.scheduler.cancel(handle);
        }
    }

    fn tick_fn(self: &Arc<Self>, key: WatchKey, generation: u64, params: WatchParams) -> Tick {
        let registry: Weak<Self> = Arc::downgrade(self);
        let shared = Arc::new((key, params));
        Arc::new(move || {
            let registry = registry.clone();
            let shared = Arc::clone(&shared);
            async move {
                if let Some(registry) = registry.upgrade() {
                    let (key, params) = &*shared;
                    registry.run_tick(key, generation, params).await;
                }
            }
            .boxed()
        })
    }

    async fn run_tick(&self, key: &WatchKey, generation: u64, params: &WatchParams) {
        match params {
            WatchParams::List(query) => match self.chat.list_conversations(query).await {
                Ok(items) => {
                    self.emit_if_current(key, generation, |emitter, connection| {
                        emitter.emit_to(
                            connection,
                            events::LIST_PATCH,
                            list_patch(&query.scope, items),
                        );
                    });
                }
                Err(e) => warn!(watch_key = %key, error = %e, "list poll failed"),
            },
            WatchParams::Messages(query) => {
                let latest = MessageQuery {
                    count: 0,
                    ..query.clone()
                };
                match self.chat.fetch_messages(&latest).await {
                    Ok(messages) => {
                        debug!(watch_key = %key, count = messages.len(), "message poll");
                        self.emit_if_current(key, generation, |emitter, connection| {
                            for message in messages {
                                let summary =
                                    inbox_summary(&query.scope, &query.item_key, &message);
                                emitter.emit_to(connection, events::ITEM_NEW, message);
                                if let Some(item) = summary {
                                    emitter.emit_to(
                                        connection,
                                        events::LIST_PATCH,
                                        list_patch(&query.scope, vec![item]),
                                    );
                                }
                            }
                        });
                    }
                    Err(e) => warn!(watch_key = %key, error = %e, "message poll failed"),
                }
            }
        }
    }

    /// Runs `emit` only if `key` is still registered with `generation`.
    fn emit_if_current(
        &self,
        key: &WatchKey,
        generation: u64,
        emit: impl FnOnce(&dyn Emitter, &ConnectionId),
    ) -> bool {
        let current = self.connections.get(&key.connection).is_some_and(|watches| {
            match watches.get(key) {
                Some(entry) if entry.generation == generation => {
                    emit(self.emitter.as_ref(), &key.connection);
                    true
                }
                _ => false,
            }
        });
        if !current {
            debug!(watch_key = %key, generation, "discarding result of stopped watch");
        }
        current
    }
}

/// `list:patch` payload with upsert semantics.
pub fn list_patch(scope: &str, items: Vec<Value>) -> Value {
    json!({
        "scope": scope,
        "operationKind": "upsert",
        "items": items,
    })
}

/// Conversation summary derived from a message that embeds its customers.
///
/// Lets list views reorder without waiting for their own poll.
pub fn inbox_summary(scope: &str, item_key: &str, message: &Value) -> Option<Value> {
    let customers = message
        .get("customers")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())?;

    let text = non_empty_str(message, "original_message")
        .or_else(|| non_empty_str(message, "message"))
        .unwrap_or_default();
    let updated_at = message
        .get("inserted_at")
        .filter(|v| !v.is_null() && v.as_str() != Some(""))
        .cloned()
        .unwrap_or_else(|| Value::String(Utc::now().to_rfc3339()));

    let mut item = Map::new();
    item.insert("id".into(), Value::String(format!("{scope}_{item_key}")));
    item.insert("type".into(), Value::String("INBOX".into()));
    item.insert(
        "snippet".into(),
        Value::String(text.chars().take(SNIPPET_CHARS).collect()),
    );
    item.insert("updated_at".into(), updated_at);
    item.insert("customers".into(), Value::Array(customers.clone()));
    Some(Value::Object(item))
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_keys_render_deterministically() {
        let conn = ConnectionId::from("c1");
        assert_eq!(WatchKey::list(&conn).to_string(), "c1|conversationList|*");
        assert_eq!(
            WatchKey::messages(&conn, "pageA", "pageA_123").to_string(),
            "c1|conversationMessages|pageA|123"
        );
        assert_eq!(
            WatchKey::messages(&conn, "pageA", "123"),
            WatchKey::messages(&conn, "pageA", "pageA_123")
        );
        assert_ne!(
            WatchKey::messages(&conn, "pageA", "123"),
            WatchKey::messages(&conn, "pageB", "123")
        );
    }

    #[test]
    fn inbox_summary_requires_customers() {
        assert!(inbox_summary("p", "1", &json!({"message": "hi"})).is_none());
        assert!(inbox_summary("p", "1", &json!({"message": "hi", "customers": []})).is_none());
    }

    #[test]
    fn inbox_summary_prefers_original_message_and_truncates() {
        let long = "x".repeat(150);
        let summary = inbox_summary(
            "pageA",
            "123",
            &json!({
                "original_message": long,
                "message": "short",
                "inserted_at": "2026-01-01T00:00:00",
                "customers": [{"id": "cust"}],
            }),
        )
        .expect("summary");

        assert_eq!(summary["id"], "pageA_123");
        assert_eq!(summary["type"], "INBOX");
        assert_eq!(summary["snippet"].as_str().map(str::len), Some(100));
        assert_eq!(summary["updated_at"], "2026-01-01T00:00:00");
        assert_eq!(summary["customers"][0]["id"], "cust");
    }

    #[test]
    fn inbox_summary_falls_back_to_message_and_now() {
        let summary = inbox_summary(
            "p",
            "9",
            &json!({"original_message": "", "message": "hello", "customers": [1]}),
        )
        .expect("summary");
        assert_eq!(summary["snippet"], "hello");
        assert!(summary["updated_at"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn list_patch_is_upsert() {
        let patch = list_patch("pageA", vec![json!({"id": 1})]);
        assert_eq!(patch["operationKind"], "upsert");
        assert_eq!(patch["scope"], "pageA");
    }
}
