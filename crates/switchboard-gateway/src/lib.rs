// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket pub/sub gateway for the Switchboard relay.
//!
//! The gateway owns the transport: it authenticates clients, keeps one
//! bounded outbound queue per connection in [`ConnectionHub`], forwards
//! inbound events to [`switchboard_relay::Relay`], and exposes the admin
//! and health HTTP routes. The hub is the relay's [`switchboard_core::Emitter`].

pub mod auth;
pub mod hub;
pub mod server;
pub mod ws;

pub use auth::{Principal, TokenVerifier, extract_token};
pub use hub::ConnectionHub;
pub use server::{GatewayState, HealthInfo, bind, cors_layer, router, serve};
