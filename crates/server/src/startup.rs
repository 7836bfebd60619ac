use std::{sync::Arc, time::Duration};

use axum::Router;
use tokio::net::TcpListener;
use configs::{AppConfig, StorageBackend};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes::{self, AppState};
use service::{
    accounts::AccountStore,
    storage::{HashStore, MemoryHashStore, RedisHashStore},
};

const CONTAINER_REDIS_HOST: &str = "redis";
const LOOPBACK_HOST: &str = "127.0.0.1";

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Prefer a host named `redis` (compose/k8s service) when it resolves,
/// otherwise loopback.
async fn default_redis_host(port: u16) -> &'static str {
    let lookup = tokio::time::timeout(
        Duration::from_secs(2),
        tokio::net::lookup_host((CONTAINER_REDIS_HOST, port)),
    )
    .await;
    match lookup {
        Ok(Ok(mut addrs)) => {
            if addrs.next().is_some() {
                CONTAINER_REDIS_HOST
            } else {
                LOOPBACK_HOST
            }
        }
        _ => LOOPBACK_HOST,
    }
}

async fn connect_store(cfg: &AppConfig) -> Result<Arc<dyn HashStore>, StartupError> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            warn!(event = "memory_backend", "using in-memory storage; data is lost on exit");
            let store: Arc<dyn HashStore> = MemoryHashStore::new();
            Ok(store)
        }
        StorageBackend::Redis => {
            let fallback = if cfg.redis.url.is_none() && cfg.redis.host.is_none() {
                default_redis_host(cfg.redis.port).await
            } else {
                LOOPBACK_HOST
            };
            let url = cfg.redis.connection_url(fallback);
            let store: Arc<dyn HashStore> = Arc::new(RedisHashStore::connect(&url).await?);
            Ok(store)
        }
    }
}

/// Connect the configured backend, seed the id counter and wrap it all in
/// handler state. Any failure here is fatal: the service never runs
/// without a reachable store.
pub async fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    let kv = connect_store(cfg).await?;
    let accounts = AccountStore::new(kv);
    let next_id = accounts.bootstrap().await?;
    info!(event = "store_ready", next_id, backend = ?cfg.storage.backend, "account store ready");
    Ok(AppState::new(accounts))
}

pub fn build_app(state: AppState) -> Router {
    routes::build_router(state, build_cors())
}

/// Binds `host:port` from config; the host may be a name such as `localhost`.
async fn bind_listener(cfg: &AppConfig) -> Result<TcpListener, StartupError> {
    let host = cfg.server.host.as_str();
    TcpListener::bind((host, cfg.server.port))
        .await
        .map_err(|source| StartupError::Bind {
            addr: format!("{host}:{}", cfg.server.port),
            source,
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!(event = "shutdown_signal", "received Ctrl+C, shutting down");
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg).await?;
    let app = build_app(state);

    let listener = bind_listener(&cfg).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    // router (and with it the store client) is dropped once serve returns
    info!(event = "store_closed", "server drained, store connection closed");
    Ok(())
}
