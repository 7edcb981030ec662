// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider clients for the Switchboard relay.
//!
//! Each client is stateless beyond its connection pool and implements one of
//! the collaborator traits from `switchboard-core`:
//!
//! - [`ChatAggregatorClient`] for [`ChatAggregator`](switchboard_core::ChatAggregator)
//! - [`TelephonyClient`] for [`Telephony`](switchboard_core::Telephony)
//! - [`LoginBridgeClient`] for [`LoginSdk`](switchboard_core::LoginSdk)

pub mod chat;
mod http;
pub mod login_bridge;
pub mod telephony;

pub use chat::ChatAggregatorClient;
pub use login_bridge::LoginBridgeClient;
pub use telephony::TelephonyClient;
