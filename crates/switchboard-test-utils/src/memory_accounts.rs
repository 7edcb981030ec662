// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account store kept in a hash map.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use switchboard_core::{
    Account, AccountSession, AccountStatus, AccountStore, AccountUpsert, SwitchboardError,
};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn upsert(&self, account: AccountUpsert) -> Result<Account, SwitchboardError> {
        account.validate()?;
        let now = Utc::now();
        let mut accounts = self.accounts.lock().await;
        let previous = accounts.get(&account.account_key);

        let stored = Account {
            account_key: account.account_key.clone(),
            profile: account.profile,
            device: account.device,
            status: AccountStatus::Active,
            session: AccountSession {
                credentials: account.credentials,
                last_active_at: now,
                last_login_at: now,
                last_login_method: account.login_method,
                session_version: previous.map_or(1, |p| p.session.session_version + 1),
            },
            created_at: previous.map_or(now, |p| p.created_at),
            updated_at: now,
        };
        accounts.insert(account.account_key, stored.clone());
        Ok(stored)
    }

    async fn find(&self, account_key: &str) -> Result<Option<Account>, SwitchboardError> {
        Ok(self.accounts.lock().await.get(account_key).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>, SwitchboardError> {
        let mut all: Vec<Account> = self.accounts.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn update_status(
        &self,
        account_key: &str,
        status: AccountStatus,
    ) -> Result<bool, SwitchboardError> {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts.get_mut(account_key) else {
            return Ok(false);
        };
        account.status = status;
        account.session.last_active_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, account_key: &str) -> Result<bool, SwitchboardError> {
        Ok(self.accounts.lock().await.remove(account_key).is_some())
    }
}
