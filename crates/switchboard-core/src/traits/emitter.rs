// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of the pub/sub fabric.

use serde_json::Value;

use crate::types::ConnectionId;

/// Pushes events to connections and named groups.
///
/// All methods are synchronous and must not block: implementations enqueue
/// onto per-connection channels and drop the event when a queue is full.
/// This lets callers emit while holding a registry lock.
pub trait Emitter: Send + Sync + 'static {
    /// Sends to one connection. Returns `false` if it is gone or its queue is full.
    fn emit_to(&self, connection: &ConnectionId, event: &str, data: Value) -> bool;

    /// Sends to every member of `group`. Returns the number of deliveries.
    fn emit_to_group(&self, group: &str, event: &str, data: Value) -> usize;

    /// Sends to every connection. Returns the number of deliveries.
    fn broadcast(&self, event: &str, data: Value) -> usize;

    fn join_group(&self, connection: &ConnectionId, group: &str);

    fn leave_group(&self, connection: &ConnectionId, group: &str);

    /// Removes every member from `group`.
    fn close_group(&self, group: &str);
}
