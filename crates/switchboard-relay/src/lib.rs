// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session state for the Switchboard relay.
//!
//! Owns the three registries behind the real-time surface:
//! - [`WatchRegistry`]: per-connection polling of conversation lists and messages
//! - [`CallManager`]: outbound call lifecycle and its watchdog
//! - [`QrLoginManager`]: QR login sessions and account persistence
//!
//! [`refresh_account_statuses`] re-checks stored sessions on demand.
//!
//! [`Relay`] ties them together and turns client events into acknowledgements.

pub mod accounts;
pub mod calls;
pub mod qr;
pub mod relay;
pub mod scheduler;
pub mod watch;

pub use accounts::{StatusReport, classify_user_info, refresh_account_statuses};
pub use calls::{CallManager, CallRecord, CallStatus, EndReason, InvalidTransition, call_group};
pub use qr::{
    QrLoginManager, QrSession, QrSettings, QrStatus, mask_phone, normalize_profile, profile_phone,
};
pub use relay::Relay;
pub use scheduler::{Scheduler, Tick, TimerHandle, TokioScheduler};
pub use watch::{ResourceScope, WatchKey, WatchParams, WatchRegistry, WatchSettings};
