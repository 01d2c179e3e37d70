//! SMS Dispatcher
//!
//! Delivers unsent messages from a SQLite store to a third-party SMS provider
//! every `period_secs`, `batch_size` messages at a time, and serves a small
//! HTTP control plane for pausing and resuming the loop.
//!
//! ## Configuration
//!
//! Loaded from TOML (`SMS_DISPATCHER_CONFIG`, `config.toml`, ...) with `SMS_*`
//! environment overrides. See `sms_config::AppConfig::example_toml`.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SMS_HTTP_PORT` | `8080` | Control plane port |
//! | `SMS_DATABASE_URL` | `sqlite://data/db.sqlite3` | Message store |
//! | `SMS_DISPATCHER_BATCH_SIZE` | `2` | Messages per cycle |
//! | `SMS_DISPATCHER_PERIOD_SECS` | `120` | Seconds between cycles |
//! | `SMS_DELIVERY_BASE_URL` | webhook.site URL | Provider base URL |
//! | `SMS_REDIS_URL` | `redis://redis:6379` | Confirmation cache, empty to disable |
//! | `LOG_FORMAT` | text | `json` for structured logs |
//! | `RUST_LOG` | `info` | Log level |

mod api;

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use sms_config::{AppConfig, ConfigLoader};
use sms_dispatch::{
    ConfirmationCache, DispatcherConfig, HttpDeliveryClient, HttpDeliveryClientConfig,
    MessageDispatcher, RedisConfirmationCache, SqliteMessageStore,
};

use crate::api::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    sms_common::logging::init_logging("sms-dispatcher");

    info!("Starting SMS Dispatcher");

    let config = ConfigLoader::new().load()?;

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    // Setup shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let store = Arc::new(create_message_store(&config).await?);

    let client = HttpDeliveryClient::new(HttpDeliveryClientConfig {
        base_url: config.delivery.base_url.clone(),
        api_token: config.delivery.api_token.clone(),
        connect_timeout: config.delivery.connect_timeout(),
        request_timeout: config.delivery.request_timeout(),
    })?;
    info!(endpoint = %client.endpoint(), "Delivery client initialized");

    let cache = create_confirmation_cache(&config).await;

    let dispatcher = Arc::new(MessageDispatcher::new(
        store.clone(),
        Arc::new(client),
        cache,
        DispatcherConfig {
            batch_size: config.dispatcher.batch_size,
            period: config.dispatcher.period(),
        },
    )?);

    let dispatcher_handle = {
        let dispatcher = Arc::clone(&dispatcher);
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = dispatcher.run() => {}
                _ = shutdown_rx.recv() => {
                    info!("Message dispatcher shutting down");
                }
            }
        })
    };

    // Control plane
    let state = AppState {
        control: dispatcher.clone(),
        store,
        metrics: metrics_handle,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Control plane listening on http://{}", addr);

    let server_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        })
    };

    info!("SMS Dispatcher started");
    info!("Press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received...");

    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(30), async {
        let _ = dispatcher_handle.await;
        let _ = server_handle.await;
    })
    .await;

    info!("SMS Dispatcher shutdown complete");
    Ok(())
}

async fn create_message_store(config: &AppConfig) -> Result<SqliteMessageStore> {
    let url = &config.database.url;
    ensure_database_dir(url)?;

    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await?;

    let store = SqliteMessageStore::new(pool);
    store.init_schema().await?;
    if config.database.seed {
        store.seed().await?;
    }

    info!("Using SQLite message store: {}", url);
    Ok(store)
}

/// Create the parent directory of a file-backed SQLite URL
fn ensure_database_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

async fn create_confirmation_cache(config: &AppConfig) -> Option<Arc<dyn ConfirmationCache>> {
    if !config.redis.enabled() {
        info!("Confirmation cache disabled");
        return None;
    }

    let connect = RedisConfirmationCache::connect(&config.redis.url);
    match tokio::time::timeout(Duration::from_secs(5), connect).await {
        Ok(Ok(cache)) => Some(Arc::new(cache)),
        Ok(Err(e)) => {
            warn!(error = %e, "Redis unavailable, continuing without confirmation cache");
            None
        }
        Err(_) => {
            warn!("Redis connection timed out, continuing without confirmation cache");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
