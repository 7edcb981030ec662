// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for linked chat accounts.
//!
//! WAL-mode SQLite with embedded migrations, accessed through
//! `tokio-rusqlite`'s single background thread.

pub mod accounts;
pub mod database;
pub mod migrations;

pub use accounts::SqliteAccountStore;
pub use database::Database;
