// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account persistence across reopen on a real database file.

use std::time::Duration;

use serde_json::json;
use switchboard_config::model::StorageConfig;
use switchboard_core::{
    AccountProfile, AccountStore, AccountUpsert, DeviceFingerprint, LoginMethod,
};
use switchboard_storage::SqliteAccountStore;

fn account(key: &str) -> AccountUpsert {
    AccountUpsert {
        account_key: key.to_string(),
        profile: AccountProfile {
            zalo_id: key.to_string(),
            display_name: format!("Account {key}"),
            ..AccountProfile::default()
        },
        device: DeviceFingerprint {
            imei: format!("imei-{key}"),
            user_agent: "Mozilla/5.0".to_string(),
            device_name: "bot-web".to_string(),
        },
        credentials: json!({"cookie": key}),
        login_method: LoginMethod::Cookie,
    }
}

#[tokio::test]
async fn accounts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("nested/relay.db").display().to_string(),
    };

    {
        let store = SqliteAccountStore::open(&config).await.unwrap();
        store.upsert(account("1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.upsert(account("2")).await.unwrap();
        store.upsert(account("2")).await.unwrap();
        store.database().close().await.unwrap();
    }

    let store = SqliteAccountStore::open(&config).await.unwrap();
    let accounts = store.list().await.unwrap();
    let keys: Vec<&str> = accounts.iter().map(|a| a.account_key.as_str()).collect();
    assert_eq!(keys, vec!["2", "1"]);
    assert_eq!(accounts[0].session.session_version, 2);
    assert_eq!(accounts[0].session.last_login_method, LoginMethod::Cookie);
    assert_eq!(accounts[1].session.credentials, json!({"cookie": "1"}));

    assert!(store.delete("1").await.unwrap());
    assert_eq!(store.list().await.unwrap().len(), 1);
}
