//! Headless dashboard client.
//!
//! Run with: cargo run -p dashboard-cli -- [config.json]
//!
//! Logs in when `DASHBOARD_EMAIL` and `DASHBOARD_PASSWORD` are set, then
//! polls the team chart and follows the live department list until Ctrl-C.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use dashboard_channel::{ChannelProvider, ListSubscription, WsConnector};
use dashboard_core::{
    DashboardConfig, NotificationCenter, SessionStore, navigation::sidebar_items,
    storage::FileTokenStorage,
};
use dashboard_fetch::{ApiClient, DashboardApi, RequestHook, ReqwestTransport, api::endpoints};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CHART_REFRESH: Duration = Duration::from_secs(30);

fn load_config() -> anyhow::Result<DashboardConfig> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => DashboardConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    Ok(config.with_env()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = load_config()?;
    let storage = FileTokenStorage::new(config.resolved_token_path(), config.token_ttl());
    let session = SessionStore::new(Arc::new(storage));

    let notices = Arc::new(NotificationCenter::new(config.notification_history));
    let mut toasts = notices.get_receiver();
    tokio::spawn(async move {
        while let Ok(notice) = toasts.recv().await {
            tracing::info!(level = ?notice.level, "{}", notice.message);
        }
    });

    let transport = ReqwestTransport::new(config.request_timeout())
        .map_err(|e| anyhow::anyhow!("building HTTP client: {e}"))?;
    let client = ApiClient::new(config.clone(), session.clone(), Arc::new(transport), notices.clone());
    let api = DashboardApi::new(client.clone());

    if let (Ok(email), Ok(password)) = (
        std::env::var("DASHBOARD_EMAIL"),
        std::env::var("DASHBOARD_PASSWORD"),
    ) {
        api.login(&email, &password).await.context("login failed")?;
    }

    let snapshot = session.snapshot();
    if !snapshot.is_authenticated() {
        tracing::warn!("No session token, requests will be rejected until login");
    }
    for item in sidebar_items(&snapshot) {
        tracing::info!(path = item.path, "{}", item.label);
    }

    let provider = ChannelProvider::spawn(&session, Arc::new(WsConnector::from_config(&config)));
    let departments = ListSubscription::departments(&provider);
    let mut department_updates = departments.subscribe();

    let chart: RequestHook<Value> = RequestHook::polling(client, endpoints::TEAM_CHART, CHART_REFRESH);
    let mut chart_updates = chart.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = chart_updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = chart_updates.borrow_and_update().clone();
                if let Some(error) = state.error {
                    tracing::warn!("Team chart unavailable: {error}");
                } else if let Some(Value::Array(rows)) = state.data.filter(|_| !state.loading) {
                    tracing::info!(teams = rows.len(), "Team chart refreshed");
                }
            }
            changed = department_updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let names: Vec<String> = department_updates
                    .borrow_and_update()
                    .iter()
                    .map(|d| d.department_name.clone())
                    .collect();
                tracing::info!(?names, "Departments updated");
            }
        }
    }

    tracing::info!("Shutting down");
    chart.unmount();
    drop(departments);
    provider.shutdown().await;
    Ok(())
}
