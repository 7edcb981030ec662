// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emitter that records every push for later assertions.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use switchboard_core::{ConnectionId, Emitter};

/// Where a recorded event was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Connection(ConnectionId),
    Group(String),
    Everyone,
}

#[derive(Debug, Clone)]
pub struct Emitted {
    pub target: Target,
    pub event: String,
    pub data: Value,
}

/// In-memory [`Emitter`]. Every connection is considered reachable.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    log: Mutex<Vec<Emitted>>,
    groups: Mutex<HashMap<String, HashSet<ConnectionId>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, target: Target, event: &str, data: Value) {
        lock(&self.log).push(Emitted {
            target,
            event: event.to_string(),
            data,
        });
    }

    /// Everything emitted so far, in order.
    pub fn all(&self) -> Vec<Emitted> {
        lock(&self.log).clone()
    }

    /// Payloads of `event`, whatever the target.
    pub fn named(&self, event: &str) -> Vec<Value> {
        lock(&self.log)
            .iter()
            .filter(|e| e.event == event)
            .map(|e| e.data.clone())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        lock(&self.log).iter().filter(|e| e.event == event).count()
    }

    /// Payloads of `event` sent directly to `connection`.
    pub fn sent_to(&self, connection: &ConnectionId, event: &str) -> Vec<Value> {
        let target = Target::Connection(connection.clone());
        lock(&self.log)
            .iter()
            .filter(|e| e.event == event && e.target == target)
            .map(|e| e.data.clone())
            .collect()
    }

    /// Payloads of `event` sent to `group`.
    pub fn sent_to_group(&self, group: &str, event: &str) -> Vec<Value> {
        let target = Target::Group(group.to_string());
        lock(&self.log)
            .iter()
            .filter(|e| e.event == event && e.target == target)
            .map(|e| e.data.clone())
            .collect()
    }

    pub fn members(&self, group: &str) -> HashSet<ConnectionId> {
        lock(&self.groups).get(group).cloned().unwrap_or_default()
    }

    pub fn clear(&self) {
        lock(&self.log).clear();
    }
}

impl Emitter for RecordingEmitter {
    fn emit_to(&self, connection: &ConnectionId, event: &str, data: Value) -> bool {
        self.record(Target::Connection(connection.clone()), event, data);
        true
    }

    fn emit_to_group(&self, group: &str, event: &str, data: Value) -> usize {
        let members = lock(&self.groups).get(group).map_or(0, HashSet::len);
        self.record(Target::Group(group.to_string()), event, data);
        members
    }

    fn broadcast(&self, event: &str, data: Value) -> usize {
        self.record(Target::Everyone, event, data);
        0
    }

    fn join_group(&self, connection: &ConnectionId, group: &str) {
        lock(&self.groups)
            .entry(group.to_string())
            .or_default()
            .insert(connection.clone());
    }

    fn leave_group(&self, connection: &ConnectionId, group: &str) {
        let mut groups = lock(&self.groups);
        if let Some(members) = groups.get_mut(group) {
            members.remove(connection);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    fn close_group(&self, group: &str) {
        lock(&self.groups).remove(group);
    }
}
