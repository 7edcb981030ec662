// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of linked chat accounts.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{Account, AccountStatus, AccountUpsert};

/// Keyed store for account credentials produced by QR login.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Inserts or replaces the account identified by `account.account_key`.
    ///
    /// Implementations call [`AccountUpsert::validate`] first.
    async fn upsert(&self, account: AccountUpsert) -> Result<Account, SwitchboardError>;

    async fn find(&self, account_key: &str) -> Result<Option<Account>, SwitchboardError>;

    /// All accounts, most recently updated first.
    async fn list(&self) -> Result<Vec<Account>, SwitchboardError>;

    /// Sets the liveness status and stamps `last_active_at` with now.
    /// Returns `false` if the account does not exist.
    async fn update_status(
        &self,
        account_key: &str,
        status: AccountStatus,
    ) -> Result<bool, SwitchboardError>;

    /// Removes an account. Returns `false` if it did not exist.
    async fn delete(&self, account_key: &str) -> Result<bool, SwitchboardError>;
}
