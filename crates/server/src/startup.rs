//! Process wiring: config → store → publisher → hub → scheduler → router.

use std::sync::Arc;

use anyhow::Context;
use relay_core::config::StoreBackend;
use relay_core::Config;
use relay_hub::Hub;
use relay_scheduler::{Emitter, RestartSignal, Scheduler, SignalingStore};
use relay_store::{MemoryStore, MessageStore, PgMessageStore};
use tracing::{error, info, warn};

use crate::live::Keepalive;
use crate::router::build_router;
use crate::seed;
use crate::state::AppState;

/// Open the configured message store (runs migrations for PostgreSQL).
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn MessageStore>> {
    let store: Arc<dyn MessageStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let store = PgMessageStore::connect(&config.postgres)
                .await
                .context("connecting to PostgreSQL")?;
            info!("PostgreSQL message store ready");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory message store; definitions are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Run until SIGINT/SIGTERM, then stop the scheduler and close all observers.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    if let Some(path) = &config.store.seed_file {
        seed::seed_file(store.as_ref(), path).await?;
    }

    let publisher = relay_broker::connect(&config.broker)
        .await
        .with_context(|| format!("opening broker {}", config.broker.describe()))?;

    let (hub, hub_task) = Hub::spawn(config.live.queue_capacity);
    let restart = RestartSignal::new();
    let store: Arc<dyn MessageStore> = Arc::new(SignalingStore::new(store, restart.clone()));

    let scheduler = Scheduler::new(store.clone(), Emitter::new(publisher, hub.clone()), restart).spawn();

    let state = Arc::new(AppState {
        store,
        hub: hub.clone(),
        scheduler: scheduler.status(),
        keepalive: Keepalive::default(),
    });
    let app = build_router(state, &config.server.cors_origin);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Observer sockets only finish once the hub lets go of them, so the hub
    // has to close before the server can drain.
    let shutdown_hub = hub.clone();
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping scheduler");
        scheduler.stop().await;
        shutdown_hub.shutdown();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    if let Err(e) = hub_task.await {
        error!(error = %e, "hub task ended abnormally");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Seed the configured store from `path` without starting the server.
pub async fn seed_only(config: &Config, path: &std::path::Path) -> anyhow::Result<()> {
    if config.store.backend == StoreBackend::Memory {
        warn!("MESSAGE_STORE=memory: seeded definitions will not outlive this command");
    }
    let store = open_store(config).await?;
    seed::seed_file(store.as_ref(), path).await?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to register signal handlers, falling back to ctrl_c");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl_c");
        std::future::pending::<()>().await;
    }
}
