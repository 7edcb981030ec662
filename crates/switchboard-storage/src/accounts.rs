// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`AccountStore`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};
use switchboard_config::model::StorageConfig;
use switchboard_core::{
    Account, AccountProfile, AccountSession, AccountStatus, AccountStore, AccountUpsert,
    DeviceFingerprint, SwitchboardError,
};
use tracing::debug;

use crate::database::{Database, map_tr_err};

const SELECT_ACCOUNT: &str = "SELECT account_key, zalo_id, display_name, avatar, phone_masked, \
     imei, user_agent, device_name, status, credentials, last_active_at, last_login_at, \
     last_login_method, session_version, created_at, updated_at FROM accounts";

/// Account store persisted in the relay's SQLite database.
pub struct SqliteAccountStore {
    db: Database,
}

impl SqliteAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the database named by `config` and applies migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, SwitchboardError> {
        Ok(Self::new(Database::open(&config.database_path).await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_error(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_time(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn parse_enum<T: FromStr>(row: &Row<'_>, column: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e| conversion_error(column, e))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let credentials: String = row.get(9)?;
    Ok(Account {
        account_key: row.get(0)?,
        profile: AccountProfile {
            zalo_id: row.get(1)?,
            display_name: row.get(2)?,
            avatar: row.get(3)?,
            phone_masked: row.get(4)?,
        },
        device: DeviceFingerprint {
            imei: row.get(5)?,
            user_agent: row.get(6)?,
            device_name: row.get(7)?,
        },
        status: parse_enum::<AccountStatus>(row, 8)?,
        session: AccountSession {
            credentials: serde_json::from_str(&credentials)
                .map_err(|e| conversion_error(9, e))?,
            last_active_at: parse_time(row, 10)?,
            last_login_at: parse_time(row, 11)?,
            last_login_method: parse_enum(row, 12)?,
            session_version: row.get(13)?,
        },
        created_at: parse_time(row, 14)?,
        updated_at: parse_time(row, 15)?,
    })
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn upsert(&self, account: AccountUpsert) -> Result<Account, SwitchboardError> {
        account.validate()?;
        let credentials = serde_json::to_string(&account.credentials).map_err(|e| {
            SwitchboardError::Storage {
                source: Box::new(e),
            }
        })?;
        let now = timestamp(Utc::now());
        let key = account.account_key.clone();

        let stored = self
            .db
            .connection()
            .call(move |conn| -> Result<Account, rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO accounts (account_key, zalo_id, display_name, avatar, \
                     phone_masked, imei, user_agent, device_name, status, credentials, \
                     last_active_at, last_login_at, last_login_method, session_version, \
                     created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?12, 1, ?11, ?11) \
                     ON CONFLICT(account_key) DO UPDATE SET \
                       zalo_id = excluded.zalo_id, \
                       display_name = excluded.display_name, \
                       avatar = excluded.avatar, \
                       phone_masked = excluded.phone_masked, \
                       imei = excluded.imei, \
                       user_agent = excluded.user_agent, \
                       device_name = excluded.device_name, \
                       status = excluded.status, \
                       credentials = excluded.credentials, \
                       last_active_at = excluded.last_active_at, \
                       last_login_at = excluded.last_login_at, \
                       last_login_method = excluded.last_login_method, \
                       session_version = accounts.session_version + 1, \
                       updated_at = excluded.updated_at",
                    params![
                        account.account_key,
                        account.profile.zalo_id,
                        account.profile.display_name,
                        account.profile.avatar,
                        account.profile.phone_masked,
                        account.device.imei,
                        account.device.user_agent,
                        account.device.device_name,
                        AccountStatus::Active.to_string(),
                        credentials,
                        now,
                        account.login_method.to_string(),
                    ],
                )?;
                let stored = tx.query_row(
                    &format!("{SELECT_ACCOUNT} WHERE account_key = ?1"),
                    params![account.account_key],
                    account_from_row,
                )?;
                tx.commit()?;
                Ok(stored)
            })
            .await
            .map_err(map_tr_err)?;

        debug!(
            account_key = %key,
            session_version = stored.session.session_version,
            "account upserted"
        );
        Ok(stored)
    }

    async fn find(&self, account_key: &str) -> Result<Option<Account>, SwitchboardError> {
        let key = account_key.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Account>, rusqlite::Error> {
                conn.query_row(
                    &format!("{SELECT_ACCOUNT} WHERE account_key = ?1"),
                    params![key],
                    account_from_row,
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn list(&self) -> Result<Vec<Account>, SwitchboardError> {
        self.db
            .connection()
            .call(|conn| -> Result<Vec<Account>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_ACCOUNT} ORDER BY updated_at DESC, account_key"
                ))?;
                let accounts = stmt
                    .query_map([], account_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(accounts)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn update_status(
        &self,
        account_key: &str,
        status: AccountStatus,
    ) -> Result<bool, SwitchboardError> {
        let key = account_key.to_string();
        let now = timestamp(Utc::now());
        let changed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE accounts SET status = ?2, last_active_at = ?3 WHERE account_key = ?1",
                    params![key, status.to_string(), now],
                )
            })
            .await
            .map_err(map_tr_err)?;
        debug!(account_key, %status, found = changed > 0, "account status updated");
        Ok(changed > 0)
    }

    async fn delete(&self, account_key: &str) -> Result<bool, SwitchboardError> {
        let key = account_key.to_string();
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute("DELETE FROM accounts WHERE account_key = ?1", params![key])
            })
            .await
            .map_err(map_tr_err)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::LoginMethod;

    fn upsert(key: &str, name: &str) -> AccountUpsert {
        AccountUpsert {
            account_key: key.to_string(),
            profile: AccountProfile {
                zalo_id: key.to_string(),
                display_name: name.to_string(),
                avatar: String::new(),
                phone_masked: "091234******8".to_string(),
            },
            device: DeviceFingerprint {
                imei: "imei".to_string(),
                user_agent: "Mozilla/5.0".to_string(),
                device_name: "bot-web".to_string(),
            },
            credentials: json!([{"key": "zpw_sek", "value": "v"}]),
            login_method: LoginMethod::Qr,
        }
    }

    async fn store() -> SqliteAccountStore {
        SqliteAccountStore::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn upsert_then_find() {
        let store = store().await;
        let stored = store.upsert(upsert("42", "Ann")).await.unwrap();
        assert_eq!(stored.session.session_version, 1);
        assert_eq!(stored.status, AccountStatus::Active);

        let found = store.find("42").await.unwrap().unwrap();
        assert_eq!(found, stored);
        assert_eq!(found.session.credentials[0]["key"], "zpw_sek");
        assert!(store.find("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_upsert_bumps_version_and_keeps_created_at() {
        let store = store().await;
        let first = store.upsert(upsert("42", "Ann")).await.unwrap();
        let second = store.upsert(upsert("42", "Annie")).await.unwrap();

        assert_eq!(second.session.session_version, 2);
        assert_eq!(second.profile.display_name, "Annie");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn invalid_upsert_is_rejected_before_writing() {
        let store = store().await;
        let mut bad = upsert("42", "Ann");
        bad.device.imei.clear();
        let err = store.upsert(bad).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Validation(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_status_keeps_session_and_stamps_activity() {
        let store = store().await;
        let stored = store.upsert(upsert("42", "Ann")).await.unwrap();

        assert!(
            store
                .update_status("42", AccountStatus::Disconnected)
                .await
                .unwrap()
        );
        let found = store.find("42").await.unwrap().unwrap();
        assert_eq!(found.status, AccountStatus::Disconnected);
        assert!(found.session.last_active_at >= stored.session.last_active_at);
        assert_eq!(found.session.session_version, 1);
        assert_eq!(found.session.credentials, stored.session.credentials);

        assert!(
            !store
                .update_status("missing", AccountStatus::Active)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = store().await;
        store.upsert(upsert("42", "Ann")).await.unwrap();
        assert!(store.delete("42").await.unwrap());
        assert!(!store.delete("42").await.unwrap());
    }
}
