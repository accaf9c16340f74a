//! Entry point: loads configuration, opens the local store, wires the
//! upstream API adapter, and runs the HTTP server and background
//! synchronizer as supervised jobs under one `WorkerHost`.
//!
//! Grounded on the teacher's `server/main.rs`: `tracing_subscriber` init,
//! `Config::from_env`, pool connect, migrations (handled inside
//! `store::init_pool`), then serve.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use monitor_core::config::Config;
use monitor_core::healthcheck::{HealthCheckEngine, HealthCheckOptions};
use monitor_core::remote::{AirgappedApi, NetworkedApi, RemoteApi};
use monitor_core::scheduler::{LoggingHooks, Scheduler};
use monitor_core::server::{build_app, AppState};
use monitor_core::store::{init_pool, Store};
use monitor_core::sync;
use monitor_core::worker_host::WorkerHost;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const LICENSE_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,monitor_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env().context("failed to load configuration")?);
    tracing::info!("configuration loaded");

    let pool = init_pool(&config.db_path)
        .await
        .context("failed to open local store")?;
    let store = Store::new(pool);

    let remote: Arc<dyn RemoteApi> = if config.airgapped {
        let pem = config.private_key_pem().context("failed to decode MONITOR_PRIVATE_KEY")?;
        Arc::new(AirgappedApi::new(pem, config.app_version.clone(), ".".to_string()))
    } else {
        let instance_id = config.instance_id.clone().unwrap_or_default();
        if instance_id.is_empty() {
            tracing::warn!("INSTANCE_ID not set; upstream requests will carry an empty X-Instance-Id until provisioned");
        }
        Arc::new(NetworkedApi::new(
            config.prime_host.clone(),
            instance_id,
            config.machine_signature.clone(),
            config.app_version.clone(),
        ))
    };

    let state = AppState {
        store: store.clone(),
        remote: remote.clone(),
        config: config.clone(),
    };

    let mut scheduler = Scheduler::new(Arc::new(LoggingHooks));

    let status_remote = remote.clone();
    scheduler.register_health_check(
        HEALTH_CHECK_INTERVAL,
        Arc::new(HealthCheckEngine::new()),
        HealthCheckOptions::default(),
        move |accumulated| {
            let remote = status_remote.clone();
            let statuses: Vec<_> = accumulated.statuses.iter().map(Into::into).collect();
            tokio::spawn(async move {
                if let Err(err) = remote
                    .post_service_status(monitor_core::remote::types::StatusPayload { statuses })
                    .await
                {
                    tracing::warn!(error = %err, "failed to post service status upstream");
                }
            });
        },
    );

    let refresh_store = store.clone();
    let refresh_remote = remote.clone();
    let refresh_version = config.app_version.clone();
    scheduler.register_license_refresh(LICENSE_REFRESH_INTERVAL, move |_token| {
        let store = refresh_store.clone();
        let remote = refresh_remote.clone();
        let version = refresh_version.clone();
        async move {
            sync::refresh_all(&store, remote.as_ref(), &version)
                .await
                .map_err(|err| err.to_string())
        }
    });

    let host = WorkerHost::new();

    host.register("scheduler", move |token| async move {
        scheduler.start_blocking(token).await;
    })
    .await;

    let port = config.port;
    host.register("http-server", move |token| async move {
        let app = build_app(state);
        let addr = format!("0.0.0.0:{port}");
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(error = %err, "failed to bind http server");
                return;
            }
        };
        tracing::info!(%addr, "control api listening");
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
        {
            tracing::error!(error = %err, "http server exited with error");
        }
    })
    .await;

    host.start().await;

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");
    host.shutdown().await;

    Ok(())
}
