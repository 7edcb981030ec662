// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound call sessions.
//!
//! [`CallManager`] owns every in-flight call, drives the provider round trip
//! and the ringing watchdog, and broadcasts each transition to the call's
//! group. A record leaves the map the moment it reaches a terminal state, and
//! whichever path removes it is the only one that broadcasts the outcome.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use serde_json::{Value, json};
use strum::Display;
use switchboard_core::{ConnectionId, Emitter, SwitchboardError, Telephony, events};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time a ringing call may wait for an answer.
pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallStatus {
    Connecting,
    Ringing,
    Accepted,
    Ended,
    Timeout,
    Error,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Timeout | Self::Error)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use CallStatus::*;
        matches!(
            (self, next),
            (Connecting, Ringing)
                | (Connecting, Error)
                | (Connecting, Ended)
                | (Ringing, Accepted)
                | (Ringing, Timeout)
                | (Ringing, Ended)
                | (Accepted, Ended)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid call transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: CallStatus,
    pub to: CallStatus,
}

/// Why a call was ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// A client asked to hang up.
    Manual { by: ConnectionId },
    /// The initiating connection went away.
    Disconnect,
    /// The janitor found the call older than the allowed age.
    Stale,
    /// The telephony provider reported the call finished.
    Provider,
}

impl EndReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Manual { .. } => "manual",
            Self::Disconnect => "disconnect",
            Self::Stale => "stale",
            Self::Provider => "provider",
        }
    }
}

/// Server-side state of one outbound call attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub call_id: String,
    pub phone_number: String,
    pub customer_id: Option<String>,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub initiator: Option<ConnectionId>,
    #[serde(skip)]
    watchdog: Option<CancellationToken>,
}

impl CallRecord {
    fn new(
        call_id: String,
        phone_number: String,
        customer_id: Option<String>,
        initiator: Option<ConnectionId>,
    ) -> Self {
        Self {
            call_id,
            phone_number,
            customer_id,
            status: CallStatus::Connecting,
            created_at: Utc::now(),
            ended_at: None,
            initiator,
            watchdog: None,
        }
    }

    /// Moves to `next`, refusing anything the state machine does not allow.
    pub fn transition(&mut self, next: CallStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn has_watchdog(&self) -> bool {
        self.watchdog.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn disarm(&mut self) {
        if let Some(token) = self.watchdog.take() {
            token.cancel();
        }
    }

    /// `call:status` payload.
    pub fn status_payload(&self) -> Value {
        json!({
            "callId": self.call_id,
            "status": self.status,
            "phoneNumber": self.phone_number,
            "customerId": self.customer_id,
        })
    }
}

/// Group that receives every event of a call.
pub fn call_group(call_id: &str) -> String {
    format!("call:{call_id}")
}

fn new_call_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("call_{}_{suffix}", Utc::now().timestamp_millis())
}

/// Tracks in-flight calls and broadcasts their transitions.
pub struct CallManager {
    telephony: Arc<dyn Telephony>,
    emitter: Arc<dyn Emitter>,
    watchdog: Duration,
    calls: DashMap<String, CallRecord>,
}

impl CallManager {
    pub fn new(
        telephony: Arc<dyn Telephony>,
        emitter: Arc<dyn Emitter>,
        watchdog: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            telephony,
            emitter,
            watchdog,
            calls: DashMap::new(),
        })
    }

    /// Creates a call in `connecting` and requests it from the provider in
    /// the background. The initiator, if any, joins the call group before
    /// the first broadcast.
    pub fn start_call(
        self: &Arc<Self>,
        initiator: Option<&ConnectionId>,
        phone_number: &str,
        customer_id: Option<String>,
    ) -> String {
        let call_id = new_call_id();
        let group = call_group(&call_id);
        if let Some(connection) = initiator {
            self.emitter.join_group(connection, &group);
        }

        let record = CallRecord::new(
            call_id.clone(),
            phone_number.to_string(),
            customer_id,
            initiator.cloned(),
        );
        let payload = record.status_payload();
        self.calls.insert(call_id.clone(), record);
        self.emitter
            .emit_to_group(&group, events::CALL_STATUS, payload);
        info!(call_id = %call_id, "call started");

        let manager = Arc::clone(self);
        let id = call_id.clone();
        let phone = phone_number.to_string();
        tokio::spawn(async move {
            match manager.telephony.place_call(&phone, &id).await {
                Ok(_) => manager.on_provider_accepted(&id),
                Err(e) => manager.on_provider_rejected(&id, &e).await,
            }
        });

        call_id
    }

    fn on_provider_accepted(self: &Arc<Self>, call_id: &str) {
        let Some(mut record) = self.calls.get_mut(call_id) else {
            debug!(call_id, "call ended before provider acknowledged it");
            return;
        };
        if record.transition(CallStatus::Ringing).is_err() {
            return;
        }

        let token = CancellationToken::new();
        record.watchdog = Some(token.clone());
        self.spawn_watchdog(call_id.to_string(), token);
        self.emitter.emit_to_group(
            &call_group(call_id),
            events::CALL_STATUS,
            record.status_payload(),
        );
        debug!(call_id, "call ringing");
    }

    async fn on_provider_rejected(&self, call_id: &str, error: &SwitchboardError) {
        let Some((_, mut record)) = self
            .calls
            .remove_if(call_id, |_, r| r.status == CallStatus::Connecting)
        else {
            return;
        };
        if let Err(e) = record.transition(CallStatus::Error) {
            debug!(call_id, error = %e, "unexpected call state on provider failure");
        }
        warn!(call_id, error = %error, "provider rejected call");
        self.finish(
            call_id,
            events::CALL_ERROR,
            json!({
                "callId": call_id,
                "status": CallStatus::Error,
                "message": error.ack_message(),
            }),
        );
        self.cancel_remote(call_id).await;
    }

    fn spawn_watchdog(self: &Arc<Self>, call_id: String, token: CancellationToken) {
        let manager: Weak<Self> = Arc::downgrade(self);
        let wait = self.watchdog;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(wait) => {
                    if let Some(manager) = manager.upgrade() {
                        manager.on_watchdog(&call_id).await;
                    }
                }
            }
        });
    }

    async fn on_watchdog(&self, call_id: &str) {
        let Some((_, mut record)) = self
            .calls
            .remove_if(call_id, |_, r| r.status == CallStatus::Ringing)
        else {
            return;
        };
        record.watchdog = None;
        if let Err(e) = record.transition(CallStatus::Timeout) {
            debug!(call_id, error = %e, "unexpected call state on watchdog");
        }
        warn!(call_id, "call timed out waiting for answer");
        self.finish(
            call_id,
            events::CALL_ERROR,
            json!({
                "callId": call_id,
                "status": CallStatus::Timeout,
                "message": "Call timeout",
            }),
        );
        self.cancel_remote(call_id).await;
    }

    /// Marks a ringing call as answered and disarms its watchdog.
    pub fn mark_accepted(&self, call_id: &str) -> Result<CallRecord, SwitchboardError> {
        let mut record = self
            .calls
            .get_mut(call_id)
            .ok_or_else(|| SwitchboardError::NotFound("call".into()))?;
        record
            .transition(CallStatus::Accepted)
            .map_err(|e| SwitchboardError::Validation(e.to_string()))?;
        record.disarm();
        self.emitter.emit_to_group(
            &call_group(call_id),
            events::CALL_STATUS,
            record.status_payload(),
        );
        info!(call_id, "call accepted");
        Ok(record.clone())
    }

    /// Ends a call: disarms the watchdog, asks the provider to cancel
    /// (failures ignored), then broadcasts `call:ended`.
    ///
    /// Returns `false` without side effects when the call is unknown.
    pub async fn end_call(&self, call_id: &str, reason: EndReason) -> bool {
        let Some((_, mut record)) = self.calls.remove(call_id) else {
            debug!(call_id, "end requested for unknown call");
            return false;
        };
        record.disarm();
        self.cancel_remote(call_id).await;
        if let Err(e) = record.transition(CallStatus::Ended) {
            debug!(call_id, error = %e, "ending call from unexpected state");
        }

        let mut payload = json!({
            "callId": call_id,
            "status": CallStatus::Ended,
            "reason": reason.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let EndReason::Manual { by } = &reason {
            payload["by"] = Value::String(by.to_string());
        }
        info!(call_id, reason = reason.as_str(), "call ended");
        self.finish(call_id, events::CALL_ENDED, payload);
        true
    }

    /// Force-ends every call the connection started.
    pub async fn disconnect(&self, connection: &ConnectionId) -> usize {
        let owned: Vec<String> = self
            .calls
            .iter()
            .filter(|entry| entry.initiator.as_ref() == Some(connection))
            .map(|entry| entry.key().clone())
            .collect();

        let mut ended = 0;
        for call_id in owned {
            if self.end_call(&call_id, EndReason::Disconnect).await {
                ended += 1;
            }
        }
        ended
    }

    /// Ends calls older than `max_age`.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;
        let stale: Vec<String> = self
            .calls
            .iter()
            .filter(|entry| entry.created_at <= cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        let mut ended = 0;
        for call_id in stale {
            if self.end_call(&call_id, EndReason::Stale).await {
                ended += 1;
            }
        }
        if ended > 0 {
            info!(count = ended, "stale calls ended");
        }
        ended
    }

    pub fn get_call(&self, call_id: &str) -> Option<CallRecord> {
        self.calls.get(call_id).map(|record| record.clone())
    }

    pub fn active_calls(&self) -> Vec<CallRecord> {
        self.calls.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.calls.len()
    }

    /// Broadcasts the final event of a removed call and closes its group.
    fn finish(&self, call_id: &str, event: &str, payload: Value) {
        let group = call_group(call_id);
        self.emitter.emit_to_group(&group, event, payload);
        self.emitter.close_group(&group);
    }

    async fn cancel_remote(&self, call_id: &str) {
        if let Err(e) = self.telephony.cancel_call(call_id).await {
            debug!(call_id, error = %e, "provider cancel failed, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        use CallStatus::*;
        let all = [Connecting, Ringing, Accepted, Ended, Timeout, Error];
        for from in [Ended, Timeout, Error] {
            assert!(from.is_terminal());
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be refused");
            }
        }
    }

    #[test]
    fn transition_sets_ended_at_on_terminal() {
        let mut record = CallRecord::new("c".into(), "1".into(), None, None);
        record.transition(CallStatus::Ringing).expect("ringing");
        assert!(record.ended_at.is_none());
        record.transition(CallStatus::Ended).expect("ended");
        assert!(record.ended_at.is_some());
        assert_eq!(
            record.transition(CallStatus::Ringing),
            Err(InvalidTransition {
                from: CallStatus::Ended,
                to: CallStatus::Ringing
            })
        );
    }

    #[test]
    fn accepted_cannot_time_out() {
        assert!(!CallStatus::Accepted.can_transition_to(CallStatus::Timeout));
        assert!(!CallStatus::Connecting.can_transition_to(CallStatus::Accepted));
    }

    #[test]
    fn call_ids_are_unique_and_prefixed() {
        let a = new_call_id();
        let b = new_call_id();
        assert_ne!(a, b);
        assert!(a.starts_with("call_"));
        assert_eq!(a.rsplit('_').next().map(str::len), Some(9));
    }

    #[test]
    fn status_payload_uses_wire_names() {
        let record = CallRecord::new("c1".into(), "0900".into(), Some("cust".into()), None);
        let payload = record.status_payload();
        assert_eq!(payload["callId"], "c1");
        assert_eq!(payload["status"], "connecting");
        assert_eq!(payload["phoneNumber"], "0900");
        assert_eq!(payload["customerId"], "cust");
    }

    struct RejectingTelephony;

    #[async_trait::async_trait]
    impl Telephony for RejectingTelephony {
        async fn place_call(&self, _: &str, _: &str) -> Result<Value, SwitchboardError> {
            Err(SwitchboardError::Internal("line busy".into()))
        }

        async fn cancel_call(&self, _: &str) -> Result<(), SwitchboardError> {
            Err(SwitchboardError::Internal("nothing to cancel".into()))
        }
    }

    struct SilentEmitter;

    impl Emitter for SilentEmitter {
        fn emit_to(&self, _: &ConnectionId, _: &str, _: Value) -> bool {
            true
        }
        fn emit_to_group(&self, _: &str, _: &str, _: Value) -> usize {
            0
        }
        fn broadcast(&self, _: &str, _: Value) -> usize {
            0
        }
        fn join_group(&self, _: &ConnectionId, _: &str) {}
        fn leave_group(&self, _: &ConnectionId, _: &str) {}
        fn close_group(&self, _: &str) {}
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn provider_rejection_is_logged_and_removes_call() {
        let manager = CallManager::new(
            Arc::new(RejectingTelephony),
            Arc::new(SilentEmitter),
            DEFAULT_WATCHDOG,
        );
        let call_id = manager.start_call(None, "0900", None);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(manager.get_call(&call_id).is_none());
        assert!(logs_contain("provider rejected call"));
        assert!(logs_contain("provider cancel failed, ignoring"));
        assert!(!manager.end_call(&call_id, EndReason::Stale).await);
    }
}
