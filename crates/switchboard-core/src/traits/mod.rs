// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits implemented outside the relay core.
//!
//! Network-facing traits use `#[async_trait]` so they can be held as
//! `Arc<dyn Trait>` and swapped for fakes in tests.

pub mod accounts;
pub mod chat;
pub mod emitter;
pub mod login;
pub mod telephony;

pub use accounts::AccountStore;
pub use chat::ChatAggregator;
pub use emitter::Emitter;
pub use login::LoginSdk;
pub use telephony::Telephony;
