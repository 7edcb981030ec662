// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live connections and named groups.
//!
//! Every WebSocket gets an unbounded outbound queue drained by its writer
//! task. Pushes are serialized once and sent without waiting, so emitting is
//! safe while the caller holds a registry lock and a tick that produces many
//! frames loses none of them.

use std::collections::HashSet;

use dashmap::DashMap;
use serde_json::Value;
use switchboard_core::{AckFrame, ConnectionId, Emitter, PushFrame};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Registry of connected clients and their group memberships.
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    groups: DashMap<String, HashSet<ConnectionId>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and returns the receiving end of its outbound queue.
    pub fn register(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.connections.insert(connection.clone(), tx).is_some() {
            warn!(connection_id = %connection, "connection id reused; previous queue dropped");
        }
        rx
    }

    /// Removes a connection and all of its group memberships.
    pub fn unregister(&self, connection: &ConnectionId) {
        self.connections.remove(connection);
        self.groups.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, connection: &ConnectionId) -> bool {
        self.connections.contains_key(connection)
    }

    /// Current members of `group`, in no particular order.
    pub fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Queues the acknowledgement of request `id`.
    pub fn ack(&self, connection: &ConnectionId, id: u64, data: Value) -> bool {
        match encode(&AckFrame { ack: id, data }) {
            Some(text) => self.deliver(connection, &text),
            None => false,
        }
    }

    /// Fails only once the connection's writer has gone away.
    fn deliver(&self, connection: &ConnectionId, text: &str) -> bool {
        let Some(sender) = self.connections.get(connection) else {
            return false;
        };
        match sender.send(text.to_string()) {
            Ok(()) => true,
            Err(_) => {
                debug!(connection_id = %connection, "push to closed connection dropped");
                false
            }
        }
    }
}

fn encode<T: serde::Serialize>(frame: &T) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "failed to serialize frame");
            None
        }
    }
}

fn push(event: &str, data: Value) -> Option<String> {
    encode(&PushFrame {
        event: event.to_string(),
        data,
    })
}

impl Emitter for ConnectionHub {
    fn emit_to(&self, connection: &ConnectionId, event: &str, data: Value) -> bool {
        match push(event, data) {
            Some(text) => self.deliver(connection, &text),
            None => false,
        }
    }

    fn emit_to_group(&self, group: &str, event: &str, data: Value) -> usize {
        let members = self.group_members(group);
        if members.is_empty() {
            return 0;
        }
        let Some(text) = push(event, data) else {
            return 0;
        };
        members
            .iter()
            .filter(|member| self.deliver(member, &text))
            .count()
    }

    fn broadcast(&self, event: &str, data: Value) -> usize {
        let Some(text) = push(event, data) else {
            return 0;
        };
        let targets: Vec<ConnectionId> =
            self.connections.iter().map(|e| e.key().clone()).collect();
        let delivered = targets
            .iter()
            .filter(|target| self.deliver(target, &text))
            .count();
        debug!(event, delivered, "broadcast");
        delivered
    }

    fn join_group(&self, connection: &ConnectionId, group: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection.clone());
    }

    fn leave_group(&self, connection: &ConnectionId, group: &str) {
        self.groups.remove_if_mut(group, |_, members| {
            members.remove(connection);
            members.is_empty()
        });
    }

    fn close_group(&self, group: &str) {
        self.groups.remove(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    fn frames(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[test]
    fn emit_to_writes_push_frame() {
        let hub = ConnectionHub::new();
        let mut rx = hub.register(conn("a"));
        assert!(hub.emit_to(&conn("a"), "list:patch", json!({"items": []})));
        assert!(!hub.emit_to(&conn("missing"), "list:patch", json!({})));
        assert_eq!(
            frames(&mut rx),
            vec![json!({"event": "list:patch", "data": {"items": []}})]
        );
    }

    #[test]
    fn group_fan_out_reaches_members_only() {
        let hub = ConnectionHub::new();
        let mut a = hub.register(conn("a"));
        let mut b = hub.register(conn("b"));
        let mut c = hub.register(conn("c"));
        hub.join_group(&conn("a"), "call:1");
        hub.join_group(&conn("b"), "call:1");

        assert_eq!(hub.emit_to_group("call:1", "call:status", json!({"status": "ringing"})), 2);
        assert_eq!(frames(&mut a).len(), 1);
        assert_eq!(frames(&mut b).len(), 1);
        assert!(frames(&mut c).is_empty());

        hub.leave_group(&conn("a"), "call:1");
        assert_eq!(hub.group_members("call:1"), vec![conn("b")]);
        hub.leave_group(&conn("b"), "call:1");
        assert!(hub.groups.get("call:1").is_none());
    }

    #[test]
    fn slow_reader_keeps_every_push_in_order() {
        let hub = ConnectionHub::new();
        let mut rx = hub.register(conn("slow"));
        for n in 0..500 {
            assert!(hub.emit_to(&conn("slow"), "item:new", json!({"n": n})));
        }
        let received = frames(&mut rx);
        assert_eq!(received.len(), 500);
        assert_eq!(received[499]["data"]["n"], 499);
    }

    #[test]
    fn closed_receiver_reports_undelivered() {
        let hub = ConnectionHub::new();
        drop(hub.register(conn("gone")));
        assert!(!hub.emit_to(&conn("gone"), "item:new", json!({})));
        assert!(!hub.ack(&conn("gone"), 3, json!({})));
    }

    #[test]
    fn unregister_clears_memberships() {
        let hub = ConnectionHub::new();
        let _a = hub.register(conn("a"));
        let _b = hub.register(conn("b"));
        hub.join_group(&conn("a"), "user:1");
        hub.join_group(&conn("a"), "role:2");
        hub.join_group(&conn("b"), "role:2");

        hub.unregister(&conn("a"));

        assert_eq!(hub.connection_count(), 1);
        assert!(hub.group_members("user:1").is_empty());
        assert_eq!(hub.group_members("role:2"), vec![conn("b")]);
    }

    #[test]
    fn close_group_and_broadcast() {
        let hub = ConnectionHub::new();
        let mut a = hub.register(conn("a"));
        let mut b = hub.register(conn("b"));
        hub.join_group(&conn("a"), "call:9");
        hub.close_group("call:9");
        assert_eq!(hub.emit_to_group("call:9", "call:ended", json!({})), 0);

        assert_eq!(hub.broadcast("notice", json!({"n": 1})), 2);
        assert_eq!(frames(&mut a), vec![json!({"event": "notice", "data": {"n": 1}})]);
        assert_eq!(frames(&mut b).len(), 1);
    }

    #[test]
    fn ack_frame_shape() {
        let hub = ConnectionHub::new();
        let mut rx = hub.register(conn("a"));
        assert!(hub.ack(&conn("a"), 7, json!({"ok": true})));
        assert!(!hub.ack(&conn("missing"), 1, json!({})));
        assert_eq!(frames(&mut rx), vec![json!({"ack": 7, "data": {"ok": true}})]);
    }
}
