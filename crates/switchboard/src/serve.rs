// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` implementation.
//!
//! Wires storage, provider clients, the relay components and the gateway,
//! then serves until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_gateway::{ConnectionHub, GatewayState};
use switchboard_providers::{ChatAggregatorClient, LoginBridgeClient, TelephonyClient};
use switchboard_relay::{
    CallManager, QrLoginManager, QrSettings, Relay, TokioScheduler, WatchRegistry, WatchSettings,
};
use switchboard_storage::SqliteAccountStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shutdown;

/// Long-lived components shared by the gateway and background tasks.
pub struct Services {
    pub relay: Arc<Relay>,
    pub hub: Arc<ConnectionHub>,
    pub calls: Arc<CallManager>,
    pub accounts: Arc<SqliteAccountStore>,
}

/// Opens storage and builds every relay component from `config`.
pub async fn build_services(config: &SwitchboardConfig) -> Result<Services, SwitchboardError> {
    let accounts = Arc::new(SqliteAccountStore::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "account store opened");

    let hub = Arc::new(ConnectionHub::new());
    let chat = Arc::new(ChatAggregatorClient::from_config(&config.chat)?);
    let telephony = Arc::new(TelephonyClient::from_config(&config.telephony)?);
    if config.telephony.api_key.is_none() {
        warn!("telephony.api_key is not set; outbound calls will be rejected upstream");
    }

    let watches = WatchRegistry::new(
        chat,
        hub.clone(),
        Arc::new(TokioScheduler),
        WatchSettings::from(&config.poll),
    );
    let calls = CallManager::new(
        telephony,
        hub.clone(),
        Duration::from_secs(config.telephony.watchdog_secs),
    );
    let qr = qr_manager(config, accounts.clone(), hub.clone())?;

    let relay = Arc::new(Relay::new(
        watches,
        calls.clone(),
        qr,
        accounts.clone(),
        hub.clone(),
    ));

    Ok(Services {
        relay,
        hub,
        calls,
        accounts,
    })
}

fn qr_manager(
    config: &SwitchboardConfig,
    accounts: Arc<SqliteAccountStore>,
    hub: Arc<ConnectionHub>,
) -> Result<Option<Arc<QrLoginManager>>, SwitchboardError> {
    if !config.qr.enabled {
        info!("QR login disabled");
        return Ok(None);
    }
    let Some(bridge_url) = config.qr.bridge_url.as_deref() else {
        warn!("qr.bridge_url is not set; QR login disabled");
        return Ok(None);
    };
    let sdk = Arc::new(LoginBridgeClient::new(bridge_url)?);
    info!(bridge_url, artifact_dir = %config.qr.artifact_dir, "QR login enabled");
    Ok(Some(QrLoginManager::new(
        sdk,
        accounts,
        hub,
        QrSettings::from_config(&config.qr, &config.server),
    )))
}

/// Periodically force-ends calls older than `max_age`.
pub fn spawn_call_janitor(
    calls: Arc<CallManager>,
    every: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let swept = calls.sweep_stale(max_age).await;
                    debug!(swept, "call sweep finished");
                }
                _ = cancel.cancelled() => {
                    debug!("call janitor shutting down");
                    break;
                }
            }
        }
    })
}

/// Runs the relay until SIGINT/SIGTERM.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        auth = config.auth.enabled,
        "starting switchboard serve"
    );

    let services = build_services(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let janitor = spawn_call_janitor(
        services.calls.clone(),
        Duration::from_secs(config.telephony.sweep_interval_secs),
        Duration::from_secs(config.telephony.stale_call_secs),
        cancel.clone(),
    );

    let state = GatewayState::from_config(&config, services.relay.clone(), services.hub.clone())?;
    let qr_dir = services
        .relay
        .qr()
        .map(|_| PathBuf::from(&config.qr.artifact_dir));
    let app = switchboard_gateway::router(state, qr_dir.as_deref());
    let listener = switchboard_gateway::bind(&config.server).await?;

    let server_cancel = cancel.clone();
    let served = switchboard_gateway::serve(listener, app, async move {
        server_cancel.cancelled().await;
    })
    .await;

    cancel.cancel();
    let _ = janitor.await;
    if let Err(e) = services.accounts.database().close().await {
        warn!(error = %e, "database checkpoint failed");
    }
    served?;

    info!("switchboard serve shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{ConnectionId, Emitter};
    use switchboard_test_utils::{MockTelephony, RecordingEmitter};

    fn config_in(dir: &tempfile::TempDir) -> SwitchboardConfig {
        let mut config = SwitchboardConfig::default();
        config.storage.database_path = dir.path().join("db/switchboard.db").display().to_string();
        config.qr.artifact_dir = dir.path().join("qr").display().to_string();
        config
    }

    #[tokio::test]
    async fn services_build_without_qr_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let services = build_services(&config_in(&dir)).await.unwrap();

        assert!(services.relay.qr().is_none());
        assert_eq!(services.calls.active_count(), 0);
        assert!(dir.path().join("db/switchboard.db").exists());
        services.hub.broadcast("noop", serde_json::Value::Null);
    }

    #[tokio::test]
    async fn services_enable_qr_with_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.qr.bridge_url = Some("http://127.0.0.1:9".into());
        let services = build_services(&config).await.unwrap();
        assert!(services.relay.qr().is_some());

        config.qr.enabled = false;
        let services = build_services(&config).await.unwrap();
        assert!(services.relay.qr().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_ends_stale_calls_until_cancelled() {
        let emitter = Arc::new(RecordingEmitter::new());
        let calls = CallManager::new(
            Arc::new(MockTelephony::new()),
            emitter.clone(),
            Duration::from_secs(3600),
        );
        let conn = ConnectionId::from("c1");
        calls.start_call(Some(&conn), "0900", None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.active_count(), 1);

        let cancel = CancellationToken::new();
        let janitor = spawn_call_janitor(
            calls.clone(),
            Duration::from_secs(60),
            Duration::ZERO,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.active_count(), 1);
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(calls.active_count(), 0);
        assert_eq!(emitter.named("call:ended")[0]["reason"], "stale");

        cancel.cancel();
        janitor.await.unwrap();
    }
}
