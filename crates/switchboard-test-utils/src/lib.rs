// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides fakes for every collaborator the relay talks to, so scenario
//! tests run without network, disk databases or real timers.
//!
//! # Components
//!
//! - [`RecordingEmitter`] - captures pushes and group membership
//! - [`MockChat`] - chat aggregator with scripted responses
//! - [`MockTelephony`] - telephony provider that accepts or rejects calls
//! - [`MockLoginSdk`] - QR login that writes an artifact and resolves on cue
//! - [`ManualScheduler`] - timers fired explicitly by the test
//! - [`InMemoryAccountStore`] - account store backed by a hash map
//! - [`RelayHarness`] - a full relay assembled from the above

pub mod emitter;
pub mod harness;
pub mod manual_scheduler;
pub mod memory_accounts;
pub mod mock_chat;
pub mod mock_login;
pub mod mock_telephony;

pub use emitter::{Emitted, RecordingEmitter, Target};
pub use harness::{RelayHarness, RelayHarnessBuilder};
pub use manual_scheduler::ManualScheduler;
pub use memory_accounts::InMemoryAccountStore;
pub use mock_chat::MockChat;
pub use mock_login::{Artifact, MockLoginSdk, login_result};
pub use mock_telephony::MockTelephony;
